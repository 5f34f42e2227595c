//! Nullable clock: deterministic time for testing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use accrue_backend::Clock;
use accrue_types::Timestamp;

/// A deterministic clock for testing.
///
/// Time only advances when you tell it to, or when someone sleeps on it:
/// `sleep` returns immediately after moving time forward and recording the
/// requested duration.
pub struct NullClock {
    current_ms: AtomicU64,
    sleeps: Mutex<Vec<Duration>>,
}

impl NullClock {
    pub fn new(initial_ms: u64) -> Self {
        Self {
            current_ms: AtomicU64::new(initial_ms),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Start at a whole number of seconds.
    pub fn at_secs(secs: u64) -> Self {
        Self::new(secs * 1_000)
    }

    /// Advance time by a number of seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    pub fn advance(&self, by: Duration) {
        self.current_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Set the time to a specific value.
    pub fn set(&self, at: Timestamp) {
        self.current_ms.store(at.as_millis(), Ordering::SeqCst);
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Default for NullClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for NullClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.current_ms.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_advances_and_records() {
        let clock = NullClock::at_secs(10);
        clock.sleep(Duration::from_secs(2)).await;
        assert_eq!(clock.now(), Timestamp::from_secs(12));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
    }
}
