//! Time source for every wait in the harness.
//!
//! The locator, the action primitives and the poller never call
//! `tokio::time` directly; they go through a [`Clock`]. Production code uses
//! [`TokioClock`]. Tests either pause tokio time or use [`ManualClock`], whose
//! sleeps advance a virtual counter and return immediately.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// A monotonic time source with an async sleep.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

/// Real time via `tokio::time`.
#[derive(Debug)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual time. `sleep` advances the clock by the requested amount and
/// returns without waiting.
#[derive(Debug, Default)]
pub struct ManualClock {
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward without sleeping, e.g. to model a slow remote call.
    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed += by;
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}
