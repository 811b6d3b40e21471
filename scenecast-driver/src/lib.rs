//! SceneCast WebDriver driver
//!
//! A small, typed client for the W3C WebDriver protocol plus the collaborators
//! the runner plugs into its orchestration core:
//! - [`Browser`]: one browser session, one tab per work session; implements
//!   [`scenecast_core::UiDriver`] and [`scenecast_core::UiProbe`]
//! - [`LoginFlow`]: implements [`scenecast_core::Authenticator`]
//!
//! # Example
//!
//! ```no_run
//! use scenecast_driver::{Browser, BrowserOptions, WebDriverClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = WebDriverClient::new("http://localhost:9515");
//!     let browser = Browser::launch(client, BrowserOptions::default()).await?;
//!     browser.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod browser;
mod elements;
pub mod error;
mod login;
mod page;
mod scripts;
mod sessions;

// Re-export commonly used types
pub use browser::{Browser, BrowserOptions};
pub use error::{Result, WebDriverError};
pub use login::{Credentials, LoginFlow};

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Every W3C response wraps its payload in a `value` field
#[derive(Debug, Deserialize)]
struct WireResponse<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// HTTP client for a WebDriver endpoint (chromedriver, geckodriver, ...)
///
/// Methods are organized into logical groups:
/// - Session and window management
/// - Navigation and script execution
/// - Element lookup and interaction
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    /// Base URL of the driver (e.g., "http://localhost:9515")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl WebDriverClient {
    /// Create a new WebDriver client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the driver (e.g., "http://localhost:9515")
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create a new WebDriver client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the driver
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn session_url(&self, session_id: &str, path: &str) -> String {
        format!("{}/session/{}{}", self.base_url, session_id, path)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle a WebDriver response and unwrap its `value` payload
    ///
    /// Non-success statuses are decoded as W3C error objects when possible.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match serde_json::from_str::<WireResponse<WireError>>(&body) {
                Ok(wire) => WebDriverError::protocol(status.as_u16(), wire.value.error, wire.value.message),
                Err(_) => WebDriverError::protocol(status.as_u16(), "unknown error", body),
            });
        }

        response
            .json::<WireResponse<T>>()
            .await
            .map(|wire| wire.value)
            .map_err(|e| WebDriverError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
