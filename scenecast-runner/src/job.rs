//! Job runtime model
//!
//! A job only exists while its batch runs. It is bound to one session for its
//! whole life and moves through the lifecycle defined by [`JobState`]; every
//! mutation goes through a method here so the lifecycle rules hold no matter
//! which part of the scheduler drives it.

use scenecast_core::domain::job::{ArtifactRef, FailureReason, JobState, SessionId};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::error::JobError;

/// Artifact saved for a completed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobArtifact {
    pub artifact: ArtifactRef,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct Job {
    id: u64,
    prompt: String,
    session: SessionId,
    state: JobState,
    /// Submission time of the current attempt
    started_at: Option<Instant>,
    retry_count: u32,
    result: Option<JobArtifact>,
    failure: Option<FailureReason>,
    /// Error of the most recent submission, if it failed
    submit_error: Option<String>,
}

impl Job {
    pub fn new(id: u64, prompt: impl Into<String>, session: SessionId) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            session,
            state: JobState::Pending,
            started_at: None,
            retry_count: 0,
            result: None,
            failure: None,
            submit_error: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn result(&self) -> Option<&JobArtifact> {
        self.result.as_ref()
    }

    pub fn failure(&self) -> Option<FailureReason> {
        self.failure
    }

    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    /// Time since the current attempt was submitted
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default()
    }

    fn transition(&mut self, next: JobState) -> Result<(), JobError> {
        if !self.state.can_transition_to(next) {
            return Err(self.invalid(next));
        }
        self.state = next;
        Ok(())
    }

    fn invalid(&self, to: JobState) -> JobError {
        JobError::InvalidTransition {
            id: self.id,
            from: self.state,
            to,
        }
    }

    /// `Pending -> Submitted`, first attempt
    pub fn mark_submitted(&mut self) -> Result<(), JobError> {
        if self.state != JobState::Pending {
            return Err(self.invalid(JobState::Submitted));
        }
        self.transition(JobState::Submitted)
    }

    /// `InFlight -> Submitted`, consuming one retry
    pub fn begin_retry(&mut self, max_retries: u32) -> Result<(), JobError> {
        if self.state != JobState::InFlight {
            return Err(self.invalid(JobState::Submitted));
        }
        if self.retry_count >= max_retries {
            return Err(JobError::RetryBudgetSpent {
                id: self.id,
                max: max_retries,
            });
        }
        self.transition(JobState::Submitted)?;
        self.retry_count += 1;
        Ok(())
    }

    /// `Submitted -> InFlight`, starting the attempt's clock
    ///
    /// A failed submission still starts the clock; the timeout policy
    /// reclaims the attempt later.
    pub fn mark_in_flight(&mut self, now: Instant, submit_error: Option<String>) -> Result<(), JobError> {
        self.transition(JobState::InFlight)?;
        self.started_at = Some(now);
        self.submit_error = submit_error;
        Ok(())
    }

    pub fn complete(&mut self, artifact: ArtifactRef, path: PathBuf) -> Result<(), JobError> {
        self.transition(JobState::Completed)?;
        self.result = Some(JobArtifact { artifact, path });
        Ok(())
    }

    pub fn fail_fatal(&mut self, reason: FailureReason) -> Result<(), JobError> {
        self.transition(JobState::FailedFatal)?;
        self.failure = Some(reason);
        Ok(())
    }

    /// Gives up after the retry budget is spent
    pub fn exhaust(&mut self) -> Result<(), JobError> {
        self.transition(JobState::FailedExhausted)?;
        self.failure = Some(if self.submit_error.is_some() {
            FailureReason::SubmitError
        } else {
            FailureReason::TimeoutExhausted
        });
        Ok(())
    }
}
