//! Nullable clock and sleeper for deterministic tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use hotspot_client::Sleeper;
use hotspot_types::Timestamp;
use hotspot_utils::Clock;

/// A deterministic clock for testing.
///
/// Time only advances when you tell it to.
pub struct NullClock {
    current: AtomicU64,
}

impl NullClock {
    pub fn new(initial_secs: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_secs),
        }
    }

    /// Advance time by a number of seconds.
    pub fn advance(&self, secs: u64) {
        self.current.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the time to a specific value.
    pub fn set(&self, secs: u64) {
        self.current.store(secs, Ordering::SeqCst);
    }
}

impl Clock for NullClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.current.load(Ordering::SeqCst))
    }
}

/// A sleeper that returns immediately and remembers what it was asked for.
#[derive(Default)]
pub struct NullSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl NullSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every requested sleep, in order.
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }

    /// Sum of all requested sleeps.
    pub fn total(&self) -> Duration {
        self.slept.lock().unwrap().iter().sum()
    }
}

impl Sleeper for NullSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_only_moves_when_told() {
        let clock = NullClock::new(100);
        assert_eq!(clock.now().as_secs(), 100);
        clock.advance(50);
        assert_eq!(clock.now().as_secs(), 150);
        clock.set(10);
        assert_eq!(clock.now().as_secs(), 10);
    }

    #[test]
    fn sleeper_records_without_sleeping() {
        let sleeper = NullSleeper::new();
        sleeper.sleep(Duration::from_secs(3600));
        sleeper.sleep(Duration::from_secs(1));
        assert_eq!(sleeper.slept().len(), 2);
        assert_eq!(sleeper.total(), Duration::from_secs(3601));
    }
}
