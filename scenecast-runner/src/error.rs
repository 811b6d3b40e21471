//! Run-level and job-level errors

use scenecast_core::domain::job::JobState;
use scenecast_core::{AuthError, DriverError};
use thiserror::Error;

/// Errors that abort a whole run
#[derive(Debug, Error)]
pub enum RunError {
    /// The driver could not open the sessions a batch needs
    #[error("failed to provision {requested} session(s): {source}")]
    Provisioning {
        requested: usize,
        #[source]
        source: DriverError,
    },

    /// The shared identity could not be established
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),
}

/// Violations of the job lifecycle
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job {id}: illegal transition {from} -> {to}")]
    InvalidTransition { id: u64, from: JobState, to: JobState },

    #[error("job {id}: retry budget of {max} spent")]
    RetryBudgetSpent { id: u64, max: u32 },
}
