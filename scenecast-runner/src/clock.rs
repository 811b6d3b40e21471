//! Time source for the orchestration core
//!
//! The scheduler and the poll state machine never call the runtime's timer
//! directly; every `now`/`sleep` goes through a [`Clock`] so runs can be
//! replayed against simulated time.

use async_trait::async_trait;
use std::time::{Duration, Instant};

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
