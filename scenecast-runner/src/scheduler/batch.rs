//! Batch scheduler
//!
//! Slices the prompt list into batches of at most `concurrency` jobs and runs
//! them one after another:
//! - Fresh sessions per batch, released on every exit path
//! - Authentication once per run, through the first session of the first batch
//! - Concurrent submission, then sequential sweeps until every job is terminal
//!   or the batch deadline passes
//!
//! Jobs still unresolved at the deadline are left as they are.

use futures::future::join_all;
use scenecast_core::domain::job::{JobState, SessionId};
use scenecast_core::domain::run::RunSummary;
use scenecast_core::{Authenticator, UiDriver};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::poller::JobPoller;
use crate::clock::Clock;
use crate::context::RunContext;
use crate::error::RunError;
use crate::job::Job;
use crate::pool::SessionPool;

pub struct BatchScheduler {
    pool: SessionPool,
    driver: Arc<dyn UiDriver>,
    auth: Arc<dyn Authenticator>,
    poller: JobPoller,
    clock: Arc<dyn Clock>,
}

impl BatchScheduler {
    pub fn new(
        driver: Arc<dyn UiDriver>,
        auth: Arc<dyn Authenticator>,
        poller: JobPoller,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool: SessionPool::new(driver.clone()),
            driver,
            auth,
            poller,
            clock,
        }
    }

    /// Runs every prompt, batch by batch
    ///
    /// Only provisioning and authentication failures abort the run; job
    /// failures end up in the returned counts.
    pub async fn run(&self, ctx: &mut RunContext, prompts: &[String]) -> Result<RunSummary, RunError> {
        let size = ctx.config().concurrency.max(1);
        let batches = prompts.len().div_ceil(size);

        info!(
            "Scheduling {} prompt(s) in {} batch(es) of up to {}",
            prompts.len(),
            batches,
            size
        );

        for chunk in prompts.chunks(size) {
            let number = ctx.begin_batch();
            info!("Starting batch {}/{} ({} job(s))", number, batches, chunk.len());

            let summary = self.run_batch(ctx, chunk).await?;
            info!(
                "Batch {}/{} finished: {} completed, {} failed, {} exhausted, {} unresolved",
                number,
                batches,
                summary.completed,
                summary.failed_fatal,
                summary.exhausted,
                summary.unresolved
            );
            ctx.record_batch(summary);
        }

        Ok(ctx.summary())
    }

    async fn run_batch(&self, ctx: &mut RunContext, prompts: &[String]) -> Result<RunSummary, RunError> {
        let sessions = self.pool.acquire_batch(prompts.len()).await?;
        let result = self.drive_batch(ctx, &sessions, prompts).await;
        self.pool.release_batch(sessions).await;
        result
    }

    async fn drive_batch(
        &self,
        ctx: &mut RunContext,
        sessions: &[SessionId],
        prompts: &[String],
    ) -> Result<RunSummary, RunError> {
        let timing = self.poller.timing().clone();

        if !ctx.is_authenticated() {
            if let Some(primary) = sessions.first() {
                info!("Authenticating through {}", primary);
                self.auth.ensure_authenticated(primary).await?;
                ctx.mark_authenticated();
            }
        }

        // The login tab is reloaded too, leaving every tab on a fresh page
        let navigations = join_all(sessions.iter().map(|s| self.driver.navigate_home(s))).await;
        for (session, result) in sessions.iter().zip(navigations) {
            if let Err(e) = result {
                warn!("Failed to open the application on {}: {}", session, e);
            }
        }
        self.clock.sleep(timing.settle_delay).await;

        let mut jobs: Vec<Job> = prompts
            .iter()
            .zip(sessions)
            .map(|(prompt, session)| Job::new(ctx.next_job_id(), prompt.clone(), session.clone()))
            .collect();

        let submissions = join_all(jobs.iter_mut().map(|job| self.poller.submit(job))).await;
        for result in submissions {
            if let Err(e) = result {
                error!("Submission bookkeeping failed: {}", e);
            }
        }
        info!("All {} prompt(s) of the batch submitted", jobs.len());

        // The polling window starts once every submission has settled
        let deadline = self.clock.now() + timing.batch_deadline;

        self.sweep(&mut jobs, deadline).await;

        let mut summary = RunSummary::default();
        for job in &jobs {
            summary.record(job.state());
            match job.state() {
                JobState::Completed => {
                    if let Some(result) = job.result() {
                        info!("Job {}: completed -> {}", job.id(), result.path.display());
                    }
                }
                JobState::FailedFatal | JobState::FailedExhausted => {
                    let reason = job.failure().map(|r| r.code()).unwrap_or_default();
                    warn!("Job {}: {} ({})", job.id(), job.state(), reason);
                }
                state => warn!("Job {}: left {} at batch deadline", job.id(), state),
            }
        }

        Ok(summary)
    }

    /// Polls non-terminal jobs one after another until all are terminal or
    /// the deadline passes
    ///
    /// Every job still pending after its tick is followed by one poll
    /// interval, capped so the loop never sleeps past the deadline.
    async fn sweep(&self, jobs: &mut [Job], deadline: Instant) {
        let poll_interval = self.poller.timing().poll_interval;
        let mut sweeps = 0u64;

        while jobs.iter().any(|job| !job.is_terminal()) {
            sweeps += 1;
            debug!("Sweep {}", sweeps);

            let mut expired = false;
            for job in jobs.iter_mut().filter(|job| !job.is_terminal()) {
                if self.clock.now() >= deadline {
                    expired = true;
                    break;
                }

                self.poller.tick(job).await;

                if !job.is_terminal() {
                    let remaining = deadline.saturating_duration_since(self.clock.now());
                    self.clock.sleep(poll_interval.min(remaining)).await;
                }
            }

            if expired {
                warn!(
                    "Batch deadline reached with {} job(s) unresolved, moving on",
                    jobs_pending(jobs)
                );
                return;
            }
        }
    }
}

fn jobs_pending(jobs: &[Job]) -> usize {
    jobs.iter().filter(|job| !job.is_terminal()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Timing};
    use crate::testing::{MemoryStore, PromptScript, ScriptedDriver, SimulatedClock};
    use std::path::PathBuf;
    use std::time::Duration;

    struct Harness {
        driver: Arc<ScriptedDriver>,
        store: Arc<MemoryStore>,
        scheduler: BatchScheduler,
    }

    fn harness(driver: ScriptedDriver, clock: SimulatedClock, timing: Timing) -> Harness {
        let driver = Arc::new(driver);
        let store = Arc::new(MemoryStore::default());
        let clock_handle: Arc<dyn Clock> = Arc::new(clock.clone());
        let poller = JobPoller::new(
            driver.clone(),
            driver.clone(),
            store.clone(),
            clock_handle.clone(),
            timing,
        );
        let scheduler = BatchScheduler::new(driver.clone(), driver.clone(), poller, clock_handle);
        Harness {
            driver,
            store,
            scheduler,
        }
    }

    fn context(concurrency: usize) -> RunContext {
        let mut config = Config::new(PathBuf::from("prompts.txt"));
        config.concurrency = concurrency;
        RunContext::new(config)
    }

    fn prompts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_batches_partition_prompts_with_contiguous_ids() {
        let clock = SimulatedClock::new();
        let mut driver = ScriptedDriver::new(clock.clone());
        let names = ["p1", "p2", "p3", "p4", "p5", "p6", "p7"];
        for name in names {
            driver = driver.script(name, PromptScript::succeeds_after(0));
        }
        let h = harness(driver, clock, Timing::default());
        let mut ctx = context(3);

        let summary = h.scheduler.run(&mut ctx, &prompts(&names)).await.unwrap();

        assert_eq!(ctx.batches(), 3);
        assert_eq!(ctx.dispatched(), 7);
        assert_eq!(summary.total, 7);
        assert_eq!(summary.completed, 7);
        assert_eq!(h.store.saved_ids(), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(h.driver.opened(), 7);
        assert_eq!(h.driver.closed().len(), 7);
        assert_eq!(h.driver.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_sessions_are_never_shared_within_a_batch() {
        let clock = SimulatedClock::new();
        let driver = ScriptedDriver::new(clock.clone())
            .script("a", PromptScript::succeeds_after(5))
            .script("b", PromptScript::succeeds_after(5));
        let h = harness(driver, clock, Timing::default());

        h.scheduler.run(&mut context(2), &prompts(&["a", "b"])).await.unwrap();

        let submissions = h.driver.submissions();
        assert_eq!(submissions.len(), 2);
        assert_ne!(submissions[0].0, submissions[1].0);
    }

    #[tokio::test]
    async fn test_authenticates_once_per_run() {
        let clock = SimulatedClock::new();
        let driver = ScriptedDriver::new(clock.clone())
            .script("a", PromptScript::succeeds_after(0))
            .script("b", PromptScript::succeeds_after(0))
            .script("c", PromptScript::succeeds_after(0));
        let h = harness(driver, clock, Timing::default());
        let mut ctx = context(2);

        h.scheduler.run(&mut ctx, &prompts(&["a", "b", "c"])).await.unwrap();

        assert!(ctx.is_authenticated());
        assert_eq!(h.driver.auth_calls(), 1);
        // every tab is reloaded, the login tab included
        assert_eq!(h.driver.navigations(), 3);
    }

    #[tokio::test]
    async fn test_deadline_ends_a_stuck_batch() {
        let clock = SimulatedClock::new();
        let driver = ScriptedDriver::new(clock.clone())
            .script("stuck", PromptScript::never())
            .script("next", PromptScript::succeeds_after(0));
        let timing = Timing {
            job_timeout: Duration::from_secs(3600),
            ..Timing::default()
        };
        let h = harness(driver, clock.clone(), timing.clone());
        let mut ctx = context(1);

        let summary = h
            .scheduler
            .run(&mut ctx, &prompts(&["stuck", "next"]))
            .await
            .unwrap();

        assert_eq!(summary.unresolved, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(h.store.saved_ids(), vec![2]);
        // two settle delays plus exactly one deadline, never more
        assert_eq!(
            clock.elapsed(),
            timing.settle_delay * 2 + timing.batch_deadline
        );
    }

    #[tokio::test]
    async fn test_polling_window_starts_after_submission() {
        let clock = SimulatedClock::new();
        let driver = ScriptedDriver::new(clock.clone())
            .script("stuck", PromptScript::never())
            .slow_submit(Duration::from_secs(120));
        let timing = Timing {
            job_timeout: Duration::from_secs(3600),
            ..Timing::default()
        };
        let h = harness(driver, clock.clone(), timing.clone());

        let summary = h
            .scheduler
            .run(&mut context(1), &prompts(&["stuck"]))
            .await
            .unwrap();

        assert_eq!(summary.unresolved, 1);
        let submitted_at = timing.settle_delay + Duration::from_secs(120);
        assert_eq!(clock.elapsed() - submitted_at, timing.batch_deadline);
    }

    #[tokio::test]
    async fn test_example_run() {
        let clock = SimulatedClock::new();
        let driver = ScriptedDriver::new(clock.clone())
            .script("a", PromptScript::succeeds_after(10))
            .script("b", PromptScript::never())
            .script("c", PromptScript::succeeds_after(5));
        let timing = Timing {
            batch_deadline: Duration::from_secs(1200),
            ..Timing::default()
        };
        let h = harness(driver, clock, timing);
        let mut ctx = context(2);

        let summary = h
            .scheduler
            .run(&mut ctx, &prompts(&["a", "b", "c"]))
            .await
            .unwrap();

        assert_eq!(ctx.batches(), 2);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.exhausted, 1);
        assert_eq!(summary.unresolved, 0);
        assert_eq!(h.store.saved_ids(), vec![1, 3]);
        assert_eq!(h.driver.submissions_of("b"), 4);
    }

    #[tokio::test]
    async fn test_fatal_and_exhausted_jobs_do_not_fail_the_run() {
        let clock = SimulatedClock::new();
        let driver = ScriptedDriver::new(clock.clone())
            .script("banned", PromptScript::banned())
            .script("broken", PromptScript::never().with_failing_submit())
            .script("fine", PromptScript::succeeds_after(20));
        let timing = Timing {
            batch_deadline: Duration::from_secs(3600),
            ..Timing::default()
        };
        let h = harness(driver, clock, timing);

        let summary = h
            .scheduler
            .run(&mut context(3), &prompts(&["banned", "broken", "fine"]))
            .await
            .unwrap();

        assert_eq!(summary.failed_fatal, 1);
        assert_eq!(summary.exhausted, 1);
        assert_eq!(summary.completed, 1);
    }

    #[tokio::test]
    async fn test_provisioning_failure_aborts_the_run() {
        let clock = SimulatedClock::new();
        let driver = ScriptedDriver::new(clock.clone())
            .script("a", PromptScript::succeeds_after(0))
            .script("b", PromptScript::succeeds_after(0))
            .fail_open_after(2);
        let h = harness(driver, clock, Timing::default());
        let mut ctx = context(2);

        let err = h
            .scheduler
            .run(&mut ctx, &prompts(&["a", "b", "c"]))
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Provisioning { requested: 1, .. }));
        assert_eq!(ctx.summary().completed, 2);
        assert_eq!(h.driver.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_authentication_failure_releases_sessions() {
        let clock = SimulatedClock::new();
        let driver = ScriptedDriver::new(clock.clone()).fail_auth();
        let h = harness(driver, clock, Timing::default());
        let mut ctx = context(3);

        let err = h
            .scheduler
            .run(&mut ctx, &prompts(&["a", "b", "c"]))
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Authentication(_)));
        assert!(h.driver.submissions().is_empty());
        assert_eq!(h.driver.closed().len(), 3);
        assert_eq!(ctx.dispatched(), 0);
    }
}
