//! Scheduler layer for the runner
//!
//! Drives jobs from submission to a terminal state. The batch scheduler
//! owns sessions and deadlines; the poller owns the per-job tick logic.

pub mod batch;
pub mod poller;

pub use batch::BatchScheduler;
pub use poller::JobPoller;
