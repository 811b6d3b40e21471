//! Job poller
//!
//! Submits jobs and evaluates them one tick at a time. Each tick checks, in
//! priority order: a blocking acknowledge control, a finished artifact, the
//! banned-content marker, and the per-attempt timeout. A finished artifact
//! always wins, even over a fatal marker shown in the same tick.

use anyhow::{Context, Result};
use scenecast_core::domain::job::FailureReason;
use scenecast_core::{UiDriver, UiProbe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Timing;
use crate::error::JobError;
use crate::job::Job;
use crate::service::ArtifactStore;

/// What a single tick did to a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Artifact saved at the given path
    Completed(PathBuf),
    /// Provider rejected the content
    Fatal,
    /// Retry budget spent
    Exhausted,
    /// Timed out and resubmitted
    Retried { attempt: u32 },
    /// Still generating
    Waiting { elapsed: Duration },
    /// Job was already terminal
    Unchanged,
}

pub struct JobPoller {
    driver: Arc<dyn UiDriver>,
    checks: Arc<dyn UiProbe>,
    store: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    timing: Timing,
}

impl JobPoller {
    pub fn new(
        driver: Arc<dyn UiDriver>,
        checks: Arc<dyn UiProbe>,
        store: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
        timing: Timing,
    ) -> Self {
        Self {
            driver,
            checks,
            store,
            clock,
            timing,
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// First submission of a pending job
    ///
    /// A failed submission is recorded on the job and the attempt's clock
    /// starts anyway; the timeout policy reclaims it.
    pub async fn submit(&self, job: &mut Job) -> Result<(), JobError> {
        job.mark_submitted()?;

        let error = match self.driver.submit_prompt(job.session(), job.prompt()).await {
            Ok(()) => {
                info!("Job {} submitted on {}", job.id(), job.session());
                None
            }
            Err(e) => {
                warn!("Job {} submission failed: {}", job.id(), e);
                Some(e.to_string())
            }
        };

        job.mark_in_flight(self.clock.now(), error)
    }

    /// Evaluates a job once
    ///
    /// Terminal jobs are left untouched. Any error raised while evaluating is
    /// logged and the job is treated as still waiting.
    pub async fn tick(&self, job: &mut Job) -> TickOutcome {
        if job.is_terminal() {
            return TickOutcome::Unchanged;
        }

        match self.evaluate(job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Job {}: poll failed, still waiting: {:#}", job.id(), e);
                TickOutcome::Waiting {
                    elapsed: job.elapsed(self.clock.now()),
                }
            }
        }
    }

    async fn evaluate(&self, job: &mut Job) -> Result<TickOutcome> {
        let session = job.session().clone();

        if self.checks.detect_action_prompt(&session).await? {
            info!("Job {}: acknowledging action prompt", job.id());
            self.driver.acknowledge_action_prompt(&session).await?;
            self.clock.sleep(self.timing.action_pause).await;
        }

        if let Some(artifact) = self.checks.find_artifact(&session).await? {
            let elapsed = job.elapsed(self.clock.now());
            let bytes = self
                .driver
                .download_artifact(&session, &artifact)
                .await
                .with_context(|| format!("Failed to download {}", artifact))?;
            let path = self.store.save(job.id(), &bytes).await?;

            job.complete(artifact, path.clone())?;
            info!(
                "Job {} completed in {}s: {}",
                job.id(),
                elapsed.as_secs(),
                path.display()
            );
            return Ok(TickOutcome::Completed(path));
        }

        if self.checks.detect_fatal_marker(&session).await? {
            job.fail_fatal(FailureReason::Banned)?;
            warn!("Job {} failed: content rejected by provider", job.id());
            return Ok(TickOutcome::Fatal);
        }

        let elapsed = job.elapsed(self.clock.now());
        if elapsed <= self.timing.job_timeout {
            debug!("Job {} waiting ({}s)", job.id(), elapsed.as_secs());
            return Ok(TickOutcome::Waiting { elapsed });
        }

        if job.retry_count() >= self.timing.max_retries {
            job.exhaust()?;
            warn!(
                "Job {} exhausted after {} retries ({})",
                job.id(),
                job.retry_count(),
                job.failure().map(|r| r.code()).unwrap_or_default()
            );
            return Ok(TickOutcome::Exhausted);
        }

        job.begin_retry(self.timing.max_retries)?;
        let attempt = job.retry_count();
        warn!(
            "Job {} timed out after {}s, retry {}/{}",
            job.id(),
            elapsed.as_secs(),
            attempt,
            self.timing.max_retries
        );
        self.resubmit(job).await?;

        Ok(TickOutcome::Retried { attempt })
    }

    /// Sends the prompt again from the entry point; the job is `Submitted`
    async fn resubmit(&self, job: &mut Job) -> Result<(), JobError> {
        if let Err(e) = self.driver.navigate_home(job.session()).await {
            warn!("Job {}: failed to navigate home: {}", job.id(), e);
        }
        self.clock.sleep(self.timing.retry_settle).await;

        let error = match self.driver.submit_prompt(job.session(), job.prompt()).await {
            Ok(()) => None,
            Err(e) => {
                warn!("Job {} resubmission failed: {}", job.id(), e);
                Some(e.to_string())
            }
        };

        job.mark_in_flight(self.clock.now(), error)
    }
}
