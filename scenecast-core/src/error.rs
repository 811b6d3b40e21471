//! Error types raised across the collaborator contracts

use thiserror::Error;

/// Errors reported by a UI driver or page check
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver endpoint could not be reached
    #[error("transport error: {0}")]
    Transport(String),

    /// The driver answered with a protocol-level error
    #[error("driver error ({error}): {message}")]
    Protocol {
        /// Error code reported by the driver
        error: String,
        /// Human readable message
        message: String,
    },

    /// An injected page script failed or returned an unexpected value
    #[error("script failed: {0}")]
    Script(String),

    /// The session handle is unknown to the driver
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Downloaded payload could not be decoded
    #[error("invalid payload: {0}")]
    Payload(String),
}

impl DriverError {
    pub fn protocol(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the authentication collaborator
#[derive(Debug, Error)]
pub enum AuthError {
    /// A login form is shown but no credentials were configured
    #[error("login required but no credentials were provided")]
    MissingCredentials,

    /// Identity stage never accepted the account
    #[error("login did not pass the identity stage after {0} attempts")]
    AttemptsExhausted(u32),

    #[error(transparent)]
    Driver(#[from] DriverError),
}
