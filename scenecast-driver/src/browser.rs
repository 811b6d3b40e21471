//! Browser collaborator
//!
//! One WebDriver session drives the whole run. Each work session is a tab of
//! that browser, so every tab shares the cookie jar the login flow fills.
//!
//! WebDriver only talks to the focused window. Every tab operation therefore
//! takes the focus lock, switches to its tab, acts and releases the lock; the
//! pauses between interaction steps happen outside the lock so other tabs can
//! make progress meanwhile.

use async_trait::async_trait;
use base64::prelude::*;
use scenecast_core::domain::job::{ArtifactRef, SessionId};
use scenecast_core::{DriverError, UiDriver, UiProbe};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::WebDriverClient;
use crate::elements::element_arg;
use crate::error::{Result, WebDriverError};
use crate::page;

/// Label of the generation tool in the chat tools menu
const VIDEO_TOOL_LABEL: &str = "Generate a video";

/// Pause between the steps of a prompt submission
const STEP_PAUSE: Duration = Duration::from_secs(2);

/// Upper bound for in-page artifact downloads
const DOWNLOAD_TIMEOUT_MS: u64 = 120_000;

/// Launch settings for the browser
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Run without a visible window
    pub headless: bool,
    /// Custom browser binary
    pub binary: Option<PathBuf>,
    /// Entry point of the application
    pub app_url: String,
    /// Viewport size in pixels
    pub window_size: (u32, u32),
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            binary: None,
            app_url: "https://business.gemini.google/".to_string(),
            window_size: (1920, 1080),
        }
    }
}

impl BrowserOptions {
    /// Builds the `alwaysMatch` capabilities for a Chromium-based browser
    pub fn capabilities(&self) -> JsonValue {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-setuid-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-extensions".to_string(),
            "--disable-gpu".to_string(),
            "--disable-infobars".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--ignore-certificate-errors".to_string(),
            format!("--window-size={},{}", self.window_size.0, self.window_size.1),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }

        let mut chrome = json!({ "args": args });
        if let Some(binary) = &self.binary {
            chrome["binary"] = json!(binary.to_string_lossy());
        }

        json!({
            "browserName": "chrome",
            "goog:chromeOptions": chrome,
        })
    }

    /// Prefix that artifact blob URLs of this application start with
    pub fn blob_prefix(&self) -> String {
        let base = self.app_url.trim_end_matches('/');
        format!("blob:{}/", base)
    }
}

#[derive(Debug, Deserialize)]
struct BlobPayload {
    ok: bool,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// A launched browser whose tabs serve as work sessions
pub struct Browser {
    client: WebDriverClient,
    session_id: String,
    app_url: String,
    blob_prefix: String,
    /// Handle of the focused tab
    focus: Mutex<Option<String>>,
}

impl Browser {
    /// Starts a browser session with the given options
    pub async fn launch(client: WebDriverClient, options: BrowserOptions) -> Result<Self> {
        info!(
            "Launching browser via {} (headless: {})",
            client.base_url(),
            options.headless
        );

        let session_id = client.new_session(options.capabilities()).await?;
        client
            .set_script_timeout(&session_id, DOWNLOAD_TIMEOUT_MS)
            .await?;

        info!("Browser session {} started", session_id);

        Ok(Self {
            client,
            session_id,
            blob_prefix: options.blob_prefix(),
            app_url: options.app_url,
            focus: Mutex::new(None),
        })
    }

    /// Ends the browser session and closes every remaining tab
    pub async fn shutdown(&self) -> Result<()> {
        info!("Closing browser session {}", self.session_id);
        self.client.delete_session(&self.session_id).await
    }

    /// Takes the focus lock and switches to the session's tab
    pub(crate) async fn focus(&self, session: &SessionId) -> Result<MutexGuard<'_, Option<String>>> {
        let mut focused = self.focus.lock().await;
        if focused.as_deref() != Some(session.as_str()) {
            self.client
                .switch_to_window(&self.session_id, session.as_str())
                .await?;
            *focused = Some(session.as_str().to_string());
        }
        Ok(focused)
    }

    /// Runs a synchronous page script in the session's tab
    pub(crate) async fn run_script(
        &self,
        session: &SessionId,
        script: &str,
        args: Vec<JsonValue>,
    ) -> Result<JsonValue> {
        let _focus = self.focus(session).await?;
        self.client.execute(&self.session_id, script, args).await
    }

    /// Runs a page script that answers with a boolean
    pub(crate) async fn run_flag(
        &self,
        session: &SessionId,
        script: &str,
        args: Vec<JsonValue>,
    ) -> Result<bool> {
        let value = self.run_script(session, script, args).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Runs a page script and fails with `what` when it reports false
    async fn run_step(&self, session: &SessionId, script: &str, args: Vec<JsonValue>, what: &str) -> Result<()> {
        if self.run_flag(session, script, args).await? {
            Ok(())
        } else {
            Err(WebDriverError::ScriptFailed(format!("{} not found", what)))
        }
    }

    /// Looks up an element in the session's tab
    pub(crate) async fn find(&self, session: &SessionId, using: &str, value: &str) -> Result<Option<String>> {
        let _focus = self.focus(session).await?;
        self.client.find_element(&self.session_id, using, value).await
    }

    /// Polls for a CSS selector until it appears or `timeout` passes
    pub(crate) async fn wait_for(
        &self,
        session: &SessionId,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(element) = self.find(session, "css selector", selector).await? {
                return Ok(Some(element));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    pub(crate) async fn click(&self, session: &SessionId, element: &str) -> Result<()> {
        let _focus = self.focus(session).await?;
        self.client.element_click(&self.session_id, element).await
    }

    /// Clicks from script, for elements the driver considers obscured
    pub(crate) async fn force_click(&self, session: &SessionId, element: &str) -> Result<()> {
        self.run_script(session, page::FORCE_CLICK, vec![element_arg(element)])
            .await
            .map(|_| ())
    }

    pub(crate) async fn clear(&self, session: &SessionId, element: &str) -> Result<()> {
        self.run_script(session, page::CLEAR_INPUT, vec![element_arg(element)])
            .await
            .map(|_| ())
    }

    pub(crate) async fn type_text(&self, session: &SessionId, element: &str, text: &str) -> Result<()> {
        let _focus = self.focus(session).await?;
        self.client
            .element_send_keys(&self.session_id, element, text)
            .await
    }

    pub(crate) async fn goto_app(&self, session: &SessionId) -> Result<()> {
        let _focus = self.focus(session).await?;
        self.client.navigate(&self.session_id, &self.app_url).await
    }
}

#[async_trait]
impl UiDriver for Browser {
    async fn open_session(&self) -> std::result::Result<SessionId, DriverError> {
        let handle = self.client.new_window(&self.session_id).await?;
        debug!("Opened tab {}", handle);
        Ok(SessionId::new(handle))
    }

    async fn close_session(&self, session: &SessionId) -> std::result::Result<(), DriverError> {
        let mut focused = self.focus(session).await?;
        let remaining = self.client.close_window(&self.session_id).await?;
        *focused = None;
        debug!("Closed tab {} ({} remaining)", session, remaining.len());
        Ok(())
    }

    async fn navigate_home(&self, session: &SessionId) -> std::result::Result<(), DriverError> {
        Ok(self.goto_app(session).await?)
    }

    async fn submit_prompt(&self, session: &SessionId, prompt: &str) -> std::result::Result<(), DriverError> {
        self.run_step(session, &page::open_tools_menu(), vec![], "tools menu button")
            .await?;
        tokio::time::sleep(STEP_PAUSE).await;

        self.run_step(session, &page::pick_tool(), vec![json!(VIDEO_TOOL_LABEL)], "video tool menu item")
            .await?;
        tokio::time::sleep(STEP_PAUSE).await;

        self.run_step(session, &page::enter_prompt(), vec![json!(prompt)], "prompt editor")
            .await?;
        tokio::time::sleep(STEP_PAUSE).await;

        self.run_step(session, &page::click_send(), vec![], "send button")
            .await?;
        Ok(())
    }

    async fn acknowledge_action_prompt(&self, session: &SessionId) -> std::result::Result<(), DriverError> {
        if !self.run_flag(session, &page::click_action_prompt(), vec![]).await? {
            warn!("Action prompt in tab {} vanished before it was clicked", session);
        }
        Ok(())
    }

    async fn download_artifact(
        &self,
        session: &SessionId,
        artifact: &ArtifactRef,
    ) -> std::result::Result<Vec<u8>, DriverError> {
        let value = {
            let _focus = self.focus(session).await?;
            self.client
                .execute_async(&self.session_id, page::FETCH_BLOB, vec![json!(artifact.locator)])
                .await?
        };

        let payload: BlobPayload = serde_json::from_value(value)
            .map_err(|e| DriverError::Payload(format!("unexpected blob payload: {}", e)))?;
        if !payload.ok {
            return Err(DriverError::Script(
                payload.error.unwrap_or_else(|| "blob fetch failed".to_string()),
            ));
        }

        let data = payload.data.unwrap_or_default();
        BASE64_STANDARD
            .decode(data.as_bytes())
            .map_err(|e| DriverError::Payload(format!("invalid base64 payload: {}", e)))
    }
}

#[async_trait]
impl UiProbe for Browser {
    async fn find_artifact(&self, session: &SessionId) -> std::result::Result<Option<ArtifactRef>, DriverError> {
        let value = self
            .run_script(session, &page::find_artifact(), vec![json!(self.blob_prefix)])
            .await?;
        Ok(value.as_str().map(ArtifactRef::new))
    }

    async fn detect_fatal_marker(&self, session: &SessionId) -> std::result::Result<bool, DriverError> {
        Ok(self.run_flag(session, &page::detect_fatal_marker(), vec![]).await?)
    }

    async fn detect_action_prompt(&self, session: &SessionId) -> std::result::Result<bool, DriverError> {
        Ok(self.run_flag(session, &page::detect_action_prompt(), vec![]).await?)
    }
}
