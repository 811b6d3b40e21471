//! Error types for the WebDriver client

use scenecast_core::DriverError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, WebDriverError>;

/// Errors that can occur when talking to a WebDriver endpoint
#[derive(Debug, Error)]
pub enum WebDriverError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The driver returned a W3C error payload
    #[error("WebDriver error (status {status}, {error}): {message}")]
    Protocol {
        /// HTTP status code
        status: u16,
        /// W3C error code (e.g. "no such element")
        error: String,
        /// Error message from the driver
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Injected script returned something unusable
    #[error("Script failed: {0}")]
    ScriptFailed(String),
}

impl WebDriverError {
    /// Create a protocol error from status code and W3C error fields
    pub fn protocol(status: u16, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            status,
            error: error.into(),
            message: message.into(),
        }
    }

    /// Check if this error means an element lookup found nothing
    pub fn is_no_such_element(&self) -> bool {
        matches!(self, Self::Protocol { error, .. } if error == "no such element")
    }

    /// Check if this error means the window or session is gone
    pub fn is_no_such_window(&self) -> bool {
        matches!(
            self,
            Self::Protocol { error, .. } if error == "no such window" || error == "invalid session id"
        )
    }
}

impl From<WebDriverError> for DriverError {
    fn from(err: WebDriverError) -> Self {
        match err {
            WebDriverError::RequestFailed(e) => DriverError::Transport(e.to_string()),
            WebDriverError::Protocol { error, message, .. }
                if error == "no such window" || error == "invalid session id" =>
            {
                DriverError::SessionNotFound(message)
            }
            WebDriverError::Protocol { error, message, .. } => DriverError::protocol(error, message),
            WebDriverError::ParseError(msg) => DriverError::Payload(msg),
            WebDriverError::ScriptFailed(msg) => DriverError::Script(msg),
        }
    }
}
