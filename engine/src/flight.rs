//! Single-flight gates for state-changing backend requests.
//!
//! Each [`FlightKey`] owns one async mutex. Holding the guard for the full
//! duration of a request means a second caller waits for the first to finish
//! and then re-checks state, instead of racing it with a duplicate request.

use tokio::sync::{Mutex, MutexGuard};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlightKey {
    /// Session start, stop and expiry correction.
    Session,
    /// Exchanges and sends.
    Ledger,
}

#[derive(Default)]
pub struct SingleFlight {
    session: Mutex<()>,
    ledger: Mutex<()>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn gate(&self, key: FlightKey) -> &Mutex<()> {
        match key {
            FlightKey::Session => &self.session,
            FlightKey::Ledger => &self.ledger,
        }
    }

    /// Wait for exclusive use of `key`.
    pub async fn enter(&self, key: FlightKey) -> MutexGuard<'_, ()> {
        let gate = self.gate(key);
        if let Ok(guard) = gate.try_lock() {
            return guard;
        }
        tracing::debug!(?key, "request already in flight, waiting");
        gate.lock().await
    }

    /// Whether a request for `key` is currently in flight.
    pub fn in_flight(&self, key: FlightKey) -> bool {
        self.gate(key).try_lock().is_err()
    }
}
