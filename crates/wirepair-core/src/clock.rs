//! Time abstraction for testability
//!
//! Engine and monitor receive their clock as a dependency instead of
//! reaching for ambient time, so time-dependent behavior stays injectable.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Time source for the protocol workers
pub trait Clock: Send + Sync {
    /// Get the current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get the current UTC datetime (for externally reported timestamps)
    fn now_utc(&self) -> DateTime<Utc>;

    /// Sleep for a duration (async)
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
