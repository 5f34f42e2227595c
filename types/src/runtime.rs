//! Mutable per-device mining state.

use serde::{Deserialize, Serialize};

use crate::{SessionId, Timestamp};

/// Where the currently displayed state came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Pulled from the backend during this process lifetime.
    Fresh,
    /// Restored from local storage without a backend round-trip.
    #[default]
    Cached,
}

/// Live mining state for this device.
///
/// `is_mining` is only ever true while `session_id` holds a backend-confirmed
/// id; [`MiningRuntimeState::is_consistent`] checks this.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MiningRuntimeState {
    pub is_mining: bool,
    /// Tokens per hour.
    pub mining_rate: f64,
    /// `mining_rate / 3600`.
    pub tokens_per_second: f64,
    /// Earnings of the current session; reset to zero on stop.
    pub total_earned: f64,
    /// Sum of all closed sessions on this device.
    pub lifetime_earned: f64,
    /// Elapsed session time, `HH:MM:SS`.
    pub runtime: String,
    /// Remaining session time, `HH:MM:SS`.
    pub countdown: String,
    pub is_initialized: bool,
    pub is_initial_loading: bool,
    pub retry_count: u32,
    pub last_sync_time: Option<Timestamp>,
    pub data_source: DataSource,
    pub network_error: Option<String>,
    pub session_id: Option<SessionId>,
    pub session_started_at: Option<Timestamp>,
}

impl MiningRuntimeState {
    /// Set the hourly rate and its per-second derivative together.
    pub fn set_rate(&mut self, mining_rate: f64) {
        self.mining_rate = mining_rate;
        self.tokens_per_second = mining_rate / 3600.0;
    }

    /// Zero every session-related field, leaving lifetime totals, rate and
    /// sync bookkeeping intact.
    pub fn clear_session(&mut self) {
        self.is_mining = false;
        self.total_earned = 0.0;
        self.session_id = None;
        self.session_started_at = None;
        self.runtime = String::new();
        self.countdown = String::new();
    }

    pub fn is_consistent(&self) -> bool {
        !self.is_mining || self.session_id.is_some()
    }
}
