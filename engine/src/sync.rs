//! Launch-time synchronization with bounded exponential-backoff retry.

use std::time::Duration;

use accrue_backend::{ActiveSession, Clock, LedgerBackend, SessionBackend};
use accrue_store::KvStore;
use accrue_types::{DataSource, Timestamp, WalletBalance};

use crate::flight::FlightKey;
use crate::reconciler::ledger_balance;
use crate::stats::EngineStats;
use crate::{EngineError, MiningEngine};

/// Deterministic retry schedule: `base_delay × 2^attempt` after each failed
/// attempt except the last.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts, including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after failed attempt `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}

/// How a launch ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    /// State was pulled from the backend.
    Synced,
    /// Recent persisted state was used without contacting the backend.
    Cached,
    /// The backend could not be reached; safe defaults are shown along with
    /// this message.
    Offline(String),
}

struct RemoteState {
    rate: f64,
    active: Option<ActiveSession>,
    balance: WalletBalance,
}

impl<B, S, C> MiningEngine<B, S, C>
where
    B: SessionBackend + LedgerBackend,
    S: KvStore,
    C: Clock,
{
    /// Run the retrying initialization and translate a terminal failure into
    /// a usable offline state.
    ///
    /// Only errors that are not initialization failures (storage, invalid
    /// transitions) are returned.
    pub async fn initialize_app(&self) -> Result<InitOutcome, EngineError> {
        {
            let mut state = self.state.write().await;
            let runtime = state.session.runtime_mut();
            runtime.is_initial_loading = true;
            runtime.network_error = None;
        }

        let result = self.retry_initialization().await;

        let mut state = self.state.write().await;
        state.session.runtime_mut().is_initial_loading = false;
        match result {
            Ok(()) => Ok(InitOutcome::Synced),
            Err(e @ EngineError::TerminalInit { .. }) => {
                let message = e.to_string();
                tracing::warn!("{message}; continuing with safe defaults");
                state.session.fail_initialization(message.clone());
                state.sync_overlay();
                self.persist(&state);
                Ok(InitOutcome::Offline(message))
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch rate, active session and balance, retrying transient failures.
    ///
    /// Gives up with [`EngineError::TerminalInit`] after the configured
    /// number of attempts, or immediately on a non-transient failure.
    pub async fn retry_initialization(&self) -> Result<(), EngineError> {
        let _flight = self.flights.enter(FlightKey::Session).await;
        let attempts = self.retry.attempts();
        let mut last_error = String::new();

        for attempt in 0..attempts {
            self.state.write().await.session.runtime_mut().retry_count = attempt;
            EngineStats::increment(&self.stats.sync_attempts);

            let err = match self.fetch_remote().await {
                Ok(remote) => return self.apply_remote(remote).await,
                Err(e) => e,
            };
            EngineStats::increment(&self.stats.sync_failures);
            last_error = err.to_string();

            if !err.is_retryable() {
                tracing::warn!(attempt = attempt + 1, "initialization failed: {err}");
                return Err(EngineError::TerminalInit {
                    attempts: attempt + 1,
                    last_error,
                });
            }
            if attempt + 1 < attempts {
                let delay = self.retry.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    of = attempts,
                    ?delay,
                    "initialization attempt failed: {err}; retrying"
                );
                self.clock.sleep(delay).await;
            } else {
                tracing::warn!(attempt = attempt + 1, "initialization attempt failed: {err}");
            }
        }

        Err(EngineError::TerminalInit {
            attempts,
            last_error,
        })
    }

    async fn fetch_remote(&self) -> Result<RemoteState, EngineError> {
        let rate = self.backend.get_mining_rate().await?;
        let active = self.backend.get_active_session().await?;
        let snapshot = self.backend.get_balance().await?;
        Ok(RemoteState {
            rate,
            active,
            balance: ledger_balance(&snapshot)?,
        })
    }

    async fn apply_remote(&self, remote: RemoteState) -> Result<(), EngineError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.session.adopt_remote(remote.rate, remote.active, now)?;
        {
            let runtime = state.session.runtime_mut();
            runtime.data_source = DataSource::Fresh;
            runtime.network_error = None;
            runtime.retry_count = 0;
            runtime.last_sync_time = Some(now);
            runtime.is_initialized = true;
        }
        state.wallet.replace(remote.balance, now);
        state.sync_overlay();
        self.persist(&state);
        tracing::info!(
            mining = state.session.is_active(),
            total = %remote.balance.total(),
            "synchronized with backend"
        );
        Ok(())
    }

    /// Whether launch must talk to the backend rather than trust the cache.
    ///
    /// True when never initialized, or when the most recent of the last sync,
    /// the current session start and the last session end is older than the
    /// staleness threshold (or none exists).
    pub async fn is_backend_sync_needed(&self, now: Timestamp) -> bool {
        let state = self.state.read().await;
        let runtime = state.session.runtime();
        if !runtime.is_initialized {
            return true;
        }
        let last_end = state.session.history().last().and_then(|s| s.end_time());
        let latest = [runtime.last_sync_time, runtime.session_started_at, last_end]
            .into_iter()
            .flatten()
            .max();
        match latest {
            Some(at) => at.is_older_than(self.stale_after, now),
            None => true,
        }
    }

    /// Trust persisted state and recompute the accrual overlay, with no I/O.
    pub async fn use_cached_state(&self) {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        {
            let runtime = state.session.runtime_mut();
            runtime.data_source = DataSource::Cached;
            runtime.is_initialized = true;
        }
        state.session.observe(now);
        state.sync_overlay();
        tracing::debug!("using cached state");
    }

    /// Sync with the backend if the cache is stale, otherwise use it.
    pub async fn sync_on_launch(&self) -> Result<InitOutcome, EngineError> {
        let now = self.clock.now();
        if self.is_backend_sync_needed(now).await {
            self.initialize_app().await
        } else {
            self.use_cached_state().await;
            Ok(InitOutcome::Cached)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 3);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn huge_attempt_saturates() {
        let policy = RetryPolicy::new(100, Duration::from_millis(500));
        assert_eq!(policy.delay_for(64), Duration::MAX);
    }

    #[test]
    fn zero_retries_means_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::from_secs(1)).attempts(), 1);
    }
}
