//! Timestamp type used throughout the engine.
//!
//! Timestamps are Unix epoch milliseconds (UTC). Accrual is anchored to
//! wall-clock differences between two timestamps, never to tick counts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A Unix timestamp in milliseconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000))
    }

    /// Get the current system time as a `Timestamp`.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(millis as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed since this timestamp (relative to `now`).
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Elapsed time since this timestamp as a `Duration`.
    pub fn duration_until(&self, now: Timestamp) -> Duration {
        Duration::from_millis(self.elapsed_since(now))
    }

    /// Whether this timestamp + `max_age` has passed relative to `now`.
    pub fn is_older_than(&self, max_age: Duration, now: Timestamp) -> bool {
        u128::from(self.elapsed_since(now)) > max_age.as_millis()
    }

    pub fn saturating_add(&self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_saturates_backwards() {
        let later = Timestamp::new(5_000);
        assert_eq!(later.elapsed_since(Timestamp::new(1_000)), 0);
    }

    #[test]
    fn older_than_is_strict() {
        let t = Timestamp::from_secs(100);
        let max_age = Duration::from_secs(300);
        assert!(!t.is_older_than(max_age, Timestamp::from_secs(400)));
        assert!(t.is_older_than(max_age, Timestamp::new(400_001)));
    }
}
