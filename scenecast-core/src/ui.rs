//! Collaborator contracts
//!
//! The orchestration core never touches page structure. Everything it needs
//! from the external application goes through these traits, so the driver can
//! be swapped (or scripted in tests) without changing the scheduler.

use async_trait::async_trait;

use crate::domain::job::{ArtifactRef, SessionId};
use crate::error::{AuthError, DriverError};

/// Session lifecycle and side-effecting interactions with the application
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Opens a fresh, isolated session
    async fn open_session(&self) -> Result<SessionId, DriverError>;

    /// Tears a session down
    async fn close_session(&self, session: &SessionId) -> Result<(), DriverError>;

    /// Points a session at the application's entry point
    async fn navigate_home(&self, session: &SessionId) -> Result<(), DriverError>;

    /// Opens the generation surface and sends the prompt
    async fn submit_prompt(&self, session: &SessionId, prompt: &str) -> Result<(), DriverError>;

    /// Clicks the continue/acknowledge control shown mid-generation
    async fn acknowledge_action_prompt(&self, session: &SessionId) -> Result<(), DriverError>;

    /// Fetches the artifact bytes behind a locator found by [`UiProbe::find_artifact`]
    async fn download_artifact(
        &self,
        session: &SessionId,
        artifact: &ArtifactRef,
    ) -> Result<Vec<u8>, DriverError>;
}

/// Read-only page checks evaluated on every poll tick
#[async_trait]
pub trait UiProbe: Send + Sync {
    /// Returns the completed artifact scoped to this session, if any
    async fn find_artifact(&self, session: &SessionId) -> Result<Option<ArtifactRef>, DriverError>;

    /// Whether the provider rejected the content permanently
    async fn detect_fatal_marker(&self, session: &SessionId) -> Result<bool, DriverError>;

    /// Whether a continue/acknowledge control is blocking progress
    async fn detect_action_prompt(&self, session: &SessionId) -> Result<bool, DriverError>;
}

/// Establishes the shared identity once per run
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn ensure_authenticated(&self, primary: &SessionId) -> Result<(), AuthError>;
}
