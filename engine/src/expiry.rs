//! Detection of sessions that ended on the backend without the device
//! noticing (server-side timeout, termination from another device).

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use accrue_backend::{Clock, LedgerBackend, SessionBackend};
use accrue_store::KvStore;

use crate::flight::FlightKey;
use crate::stats::EngineStats;
use crate::{EngineError, MiningEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// Nothing to check; no session is active locally.
    NotMining,
    /// The backend still runs the local session.
    Confirmed,
    /// The local session was cleared to match the backend.
    Corrected,
    /// The backend could not be asked; local state is unchanged.
    Unreachable,
}

impl<B, S, C> MiningEngine<B, S, C>
where
    B: SessionBackend + LedgerBackend,
    S: KvStore,
    C: Clock,
{
    /// Compare the local active session with the backend's.
    ///
    /// When the backend has no session, or a different one, the local
    /// session is cleared. Failures to reach the backend are logged and
    /// leave the local belief untouched; this never returns an error.
    pub async fn check_session_expiry(&self) -> ExpiryOutcome {
        let _flight = self.flights.enter(FlightKey::Session).await;

        let local = {
            let state = self.state.read().await;
            if !state.session.is_active() {
                return ExpiryOutcome::NotMining;
            }
            state.session.runtime().session_id.clone()
        };

        let remote = match self.backend.get_active_session().await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!("session expiry check failed: {e}");
                return ExpiryOutcome::Unreachable;
            }
        };

        let now = self.clock.now();
        let mut state = self.state.write().await;
        match remote {
            Some(active) if Some(&active.session_id) == local.as_ref() => {
                state.session.observe(now);
                state.sync_overlay();
                ExpiryOutcome::Confirmed
            }
            other => {
                if let Some(active) = other {
                    let conflict = EngineError::SessionConflict {
                        local: local.map(|id| id.to_string()).unwrap_or_default(),
                        remote: active.session_id.to_string(),
                    };
                    tracing::warn!("{conflict}; clearing local session");
                }
                state.session.force_expire();
                state.sync_overlay();
                EngineStats::increment(&self.stats.expiry_corrections);
                self.persist(&state);
                ExpiryOutcome::Corrected
            }
        }
    }
}

/// Runs [`MiningEngine::check_session_expiry`] on a fixed interval.
pub struct ExpiryWatcher {
    interval: Duration,
}

impl ExpiryWatcher {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Poll until `shutdown` turns true. The first check runs immediately
    /// unless shutdown was already requested.
    pub async fn run<B, S, C>(
        &self,
        engine: &MiningEngine<B, S, C>,
        mut shutdown: watch::Receiver<bool>,
    )
    where
        B: SessionBackend + LedgerBackend,
        S: KvStore,
        C: Clock,
    {
        if *shutdown.borrow() {
            return;
        }
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval = ?self.interval, "expiry watcher started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = engine.check_session_expiry().await;
                    tracing::debug!(?outcome, "session expiry check");
                }
                _ = shutdown.wait_for(|stopped| *stopped) => {
                    tracing::info!("expiry watcher stopping");
                    break;
                }
            }
        }
    }
}
