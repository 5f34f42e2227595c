//! Closed mining session records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Timestamp;

/// Opaque backend-issued session identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One finished mining interval.
///
/// Created only when a session is stopped and never mutated afterwards; the
/// fields are private and exposed through getters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MiningSession {
    id: SessionId,
    start_time: Timestamp,
    end_time: Option<Timestamp>,
    total_earned: f64,
    duration_ms: u64,
    mining_rate: f64,
}

impl MiningSession {
    pub fn new(
        id: SessionId,
        start_time: Timestamp,
        end_time: Option<Timestamp>,
        total_earned: f64,
        duration_ms: u64,
        mining_rate: f64,
    ) -> Self {
        Self {
            id,
            start_time,
            end_time,
            total_earned: total_earned.max(0.0),
            duration_ms,
            mining_rate,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    pub fn end_time(&self) -> Option<Timestamp> {
        self.end_time
    }

    /// Tokens earned over the whole session.
    pub fn total_earned(&self) -> f64 {
        self.total_earned
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Tokens per hour while the session ran.
    pub fn mining_rate(&self) -> f64 {
        self.mining_rate
    }
}
