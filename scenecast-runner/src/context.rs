//! Run context
//!
//! Owns the state that outlives a single batch:
//! - The resolved configuration
//! - The job-id counter, continued across batch boundaries
//! - Whether the shared identity has been established
//! - The outcome counts accumulated so far

use scenecast_core::domain::run::RunSummary;

use crate::config::Config;

pub struct RunContext {
    config: Config,
    last_job_id: u64,
    authenticated: bool,
    batches: usize,
    summary: RunSummary,
}

impl RunContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            last_job_id: 0,
            authenticated: false,
            batches: 0,
            summary: RunSummary::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Assigns the next job id; ids start at 1
    pub fn next_job_id(&mut self) -> u64 {
        self.last_job_id += 1;
        self.last_job_id
    }

    /// Number of jobs dispatched so far
    pub fn dispatched(&self) -> u64 {
        self.last_job_id
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn mark_authenticated(&mut self) {
        self.authenticated = true;
    }

    /// Starts a new batch and returns its 1-based number
    pub fn begin_batch(&mut self) -> usize {
        self.batches += 1;
        self.batches
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn record_batch(&mut self, batch: RunSummary) {
        self.summary.absorb(batch);
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }
}
