//! Session, window and navigation endpoints

use crate::WebDriverClient;
use crate::error::Result;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewSession {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct NewWindow {
    handle: String,
}

impl WebDriverClient {
    // =============================================================================
    // Sessions
    // =============================================================================

    /// Start a new browser session
    ///
    /// # Arguments
    /// * `capabilities` - The `alwaysMatch` capabilities object
    ///
    /// # Returns
    /// The session id assigned by the driver
    pub async fn new_session(&self, capabilities: JsonValue) -> Result<String> {
        let url = format!("{}/session", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "capabilities": { "alwaysMatch": capabilities } }))
            .send()
            .await?;

        let session: NewSession = self.handle_response(response).await?;
        Ok(session.session_id)
    }

    /// End a browser session, closing every window it owns
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let url = self.session_url(session_id, "");
        let response = self.client.delete(&url).send().await?;

        self.handle_response::<JsonValue>(response).await?;
        Ok(())
    }

    /// Set the script timeout used by asynchronous scripts
    pub async fn set_script_timeout(&self, session_id: &str, millis: u64) -> Result<()> {
        let url = self.session_url(session_id, "/timeouts");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "script": millis }))
            .send()
            .await?;

        self.handle_response::<JsonValue>(response).await?;
        Ok(())
    }

    // =============================================================================
    // Windows
    // =============================================================================

    /// Open a new tab and return its window handle
    ///
    /// The new tab does not receive focus.
    pub async fn new_window(&self, session_id: &str) -> Result<String> {
        let url = self.session_url(session_id, "/window/new");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "type": "tab" }))
            .send()
            .await?;

        let window: NewWindow = self.handle_response(response).await?;
        Ok(window.handle)
    }

    /// Focus the window with the given handle
    pub async fn switch_to_window(&self, session_id: &str, handle: &str) -> Result<()> {
        let url = self.session_url(session_id, "/window");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "handle": handle }))
            .send()
            .await?;

        self.handle_response::<JsonValue>(response).await?;
        Ok(())
    }

    /// Close the focused window
    ///
    /// # Returns
    /// Handles of the windows that remain open
    pub async fn close_window(&self, session_id: &str) -> Result<Vec<String>> {
        let url = self.session_url(session_id, "/window");
        let response = self.client.delete(&url).send().await?;

        self.handle_response(response).await
    }

    /// List the handles of every open window
    pub async fn window_handles(&self, session_id: &str) -> Result<Vec<String>> {
        let url = self.session_url(session_id, "/window/handles");
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Navigation
    // =============================================================================

    /// Navigate the focused window and wait for the page load
    pub async fn navigate(&self, session_id: &str, target: &str) -> Result<()> {
        let url = self.session_url(session_id, "/url");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "url": target }))
            .send()
            .await?;

        self.handle_response::<JsonValue>(response).await?;
        Ok(())
    }
}
