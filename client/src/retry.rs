//! Retry policy and the loop that executes it.
//!
//! [`Backoff`] is a pure attempt -> delay policy. [`Retrier`] runs an
//! operation under that policy and suspends through a [`Sleeper`], so tests
//! can drive it without real delays.

use std::sync::Arc;
use std::time::Duration;

use crate::FetchError;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(1500);

/// Suspends the current thread.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real sleeping via [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Linear backoff: the n-th retry waits `n * base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Retries allowed after the first failure.
    pub max_attempts: u32,
    pub base: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base: DEFAULT_RETRY_BASE,
        }
    }
}

impl Backoff {
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self { max_attempts, base }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt)
    }

    /// Whether retry number `attempt` (1-based) is still within budget.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}

/// Runs fallible requests under a [`Backoff`] policy.
///
/// Rate-limit responses wait for the server's hint instead of the backoff
/// delay, but still consume an attempt.
#[derive(Clone)]
pub struct Retrier {
    backoff: Backoff,
    sleeper: Arc<dyn Sleeper>,
}

impl Retrier {
    pub fn new(backoff: Backoff, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { backoff, sleeper }
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    pub fn run<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let mut attempt = 0;
        loop {
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => err,
            };

            attempt += 1;
            if !self.backoff.allows(attempt) {
                tracing::error!(what, attempts = attempt, error = %err, "retries exhausted");
                return Err(FetchError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = match &err {
                FetchError::RateLimited { wait } => *wait,
                _ => self.backoff.delay(attempt),
            };
            tracing::warn!(
                what,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "request failed, backing off"
            );
            self.sleeper.sleep(delay);
        }
    }
}
