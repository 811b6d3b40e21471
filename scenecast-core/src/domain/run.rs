//! Run status domain types
//!
//! The run status record is the only durable description of a run besides the
//! saved artifacts themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::JobState;

/// Final status of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Outcome counts aggregated over every batch of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub failed_fatal: usize,
    pub exhausted: usize,
    /// Jobs still in flight when their batch deadline expired
    pub unresolved: usize,
}

impl RunSummary {
    /// Counts one job by its final state
    pub fn record(&mut self, state: JobState) {
        self.total += 1;
        match state {
            JobState::Completed => self.completed += 1,
            JobState::FailedFatal => self.failed_fatal += 1,
            JobState::FailedExhausted => self.exhausted += 1,
            JobState::Pending | JobState::Submitted | JobState::InFlight => {
                self.unresolved += 1
            }
        }
    }

    /// Folds a batch summary into the run total
    pub fn absorb(&mut self, other: RunSummary) {
        self.total += other.total;
        self.completed += other.completed;
        self.failed_fatal += other.failed_fatal;
        self.exhausted += other.exhausted;
        self.unresolved += other.unresolved;
    }
}

/// Status record written to the job-metadata sink
///
/// Only the fields set for a given transition are serialized; the reporter
/// merges them over whatever the sink already holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatusRecord {
    pub status: RunStatus,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_scenes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RunStatusRecord {
    pub fn completed(summary: RunSummary) -> Self {
        Self {
            status: RunStatus::Completed,
            finished_at: Utc::now(),
            total_scenes: Some(summary.total),
            summary: Some(summary),
            error: None,
            reason: None,
        }
    }

    /// Failure caused by an error raised during the run
    pub fn failed_with_error(error: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            finished_at: Utc::now(),
            total_scenes: None,
            summary: None,
            error: Some(error.into()),
            reason: None,
        }
    }

    /// Failure identified by a reason code (e.g. `no_prompts`)
    pub fn failed_with_reason(reason: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            finished_at: Utc::now(),
            total_scenes: None,
            summary: None,
            error: None,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_record() {
        let mut summary = RunSummary::default();
        summary.record(JobState::Completed);
        summary.record(JobState::FailedExhausted);
        summary.record(JobState::InFlight);
        summary.record(JobState::FailedFatal);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.exhausted, 1);
        assert_eq!(summary.failed_fatal, 1);
        assert_eq!(summary.unresolved, 1);
    }

    #[test]
    fn test_summary_absorb() {
        let mut run = RunSummary::default();
        let mut batch = RunSummary::default();
        batch.record(JobState::Completed);
        batch.record(JobState::Completed);
        run.absorb(batch);
        run.absorb(batch);

        assert_eq!(run.total, 4);
        assert_eq!(run.completed, 4);
    }

    #[test]
    fn test_failed_record_serialization() {
        let record = RunStatusRecord::failed_with_reason("no_prompts");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["status"], "failed");
        assert_eq!(value["reason"], "no_prompts");
        assert!(value["finished_at"].is_string());
        assert!(value.get("error").is_none());
        assert!(value.get("total_scenes").is_none());
    }

    #[test]
    fn test_completed_record_serialization() {
        let mut summary = RunSummary::default();
        summary.record(JobState::Completed);
        summary.record(JobState::FailedExhausted);

        let value = serde_json::to_value(RunStatusRecord::completed(summary)).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["total_scenes"], 2);
        assert_eq!(value["summary"]["exhausted"], 1);
    }
}
