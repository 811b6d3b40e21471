//! Session pool
//!
//! Hands out fresh sessions per batch and tears them down afterwards:
//! - Every batch gets brand new sessions, never reused from an earlier batch
//! - Provisioning failures are fatal to the run
//! - Teardown is best effort and never masks the batch outcome

use scenecast_core::UiDriver;
use scenecast_core::domain::job::SessionId;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::RunError;

pub struct SessionPool {
    driver: Arc<dyn UiDriver>,
}

impl SessionPool {
    pub fn new(driver: Arc<dyn UiDriver>) -> Self {
        Self { driver }
    }

    /// Opens `size` fresh sessions
    ///
    /// If any session fails to open, the ones already opened are released
    /// before the error is returned.
    pub async fn acquire_batch(&self, size: usize) -> Result<Vec<SessionId>, RunError> {
        let mut sessions = Vec::with_capacity(size);

        for _ in 0..size {
            match self.driver.open_session().await {
                Ok(session) => {
                    debug!("Session {} opened", session);
                    sessions.push(session);
                }
                Err(source) => {
                    warn!(
                        "Failed to open session {}/{}: {}",
                        sessions.len() + 1,
                        size,
                        source
                    );
                    self.release_batch(sessions).await;
                    return Err(RunError::Provisioning {
                        requested: size,
                        source,
                    });
                }
            }
        }

        info!("Acquired {} session(s)", sessions.len());
        Ok(sessions)
    }

    /// Closes every session, logging (never returning) teardown failures
    pub async fn release_batch(&self, sessions: Vec<SessionId>) {
        let count = sessions.len();
        let mut failures = 0;

        for session in sessions {
            if let Err(e) = self.driver.close_session(&session).await {
                failures += 1;
                warn!("Failed to close session {}: {}", session, e);
            }
        }

        if failures == 0 {
            debug!("Released {} session(s)", count);
        } else {
            warn!("Released {} session(s), {} failed to close", count, failures);
        }
    }
}
