//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a work session (one isolated UI context, e.g. a browser tab)
///
/// Owned by the session pool; jobs only hold a copy of the handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Locator of a generated artifact inside a session (e.g. a blob URL)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub locator: String,
}

impl ArtifactRef {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.locator)
    }
}

/// Job lifecycle state
///
/// ```text
/// Pending -> Submitted -> InFlight -> { Completed | FailedFatal | FailedExhausted }
///                 ^           |
///                 +-- retry --+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Submitted,
    InFlight,
    Completed,
    FailedFatal,
    FailedExhausted,
}

impl JobState {
    /// Terminal states are sticky: no further polling or mutation happens.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::FailedFatal | JobState::FailedExhausted
        )
    }

    /// Checks whether `self -> next` is an edge of the lifecycle graph.
    ///
    /// The retry budget on `InFlight -> Submitted` is enforced by the job,
    /// not here.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Submitted)
                | (Submitted, InFlight)
                | (InFlight, Submitted)
                | (InFlight, Completed)
                | (InFlight, FailedFatal)
                | (InFlight, FailedExhausted)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Submitted => "submitted",
            JobState::InFlight => "in_flight",
            JobState::Completed => "completed",
            JobState::FailedFatal => "failed_fatal",
            JobState::FailedExhausted => "failed_exhausted",
        };
        f.write_str(s)
    }
}

/// Coded reason attached to a failed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Provider rejected the content permanently
    Banned,
    /// Every attempt timed out and the retry budget is spent
    TimeoutExhausted,
    /// Retry budget spent and the most recent submission never reached the UI
    SubmitError,
}

impl FailureReason {
    pub fn code(self) -> &'static str {
        match self {
            FailureReason::Banned => "banned",
            FailureReason::TimeoutExhausted => "timeout_exhausted",
            FailureReason::SubmitError => "submit_error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
