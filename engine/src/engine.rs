//! The owning engine context.
//!
//! [`MiningEngine`] is constructed with an injected backend, store and clock
//! and holds all mutable state behind one `RwLock`. The lock is never held
//! across a backend await; state-changing backend requests are serialized by
//! the [`SingleFlight`] gates instead.
//!
//! Session operations live here; balance, sync and expiry operations are in
//! their own modules as further `impl` blocks.

use std::time::Duration;

use tokio::sync::RwLock;

use accrue_backend::{Clock, LedgerBackend, SessionBackend};
use accrue_store::KvStore;
use accrue_types::{
    DataSource, MiningIntegration, MiningRuntimeState, MiningSession, SessionId, TokenAmount,
    TypesError, WalletBalance,
};

use crate::flight::{FlightKey, SingleFlight};
use crate::persistence::{PersistedSnapshot, Persistence, SNAPSHOT_VERSION};
use crate::reconciler::BalanceReconciler;
use crate::session::{SessionController, SessionPhase};
use crate::stats::EngineStats;
use crate::sync::RetryPolicy;
use crate::{EngineConfig, EngineError};

pub(crate) struct EngineState {
    pub(crate) session: SessionController,
    pub(crate) wallet: BalanceReconciler,
}

impl EngineState {
    /// Push the current session earnings into the wallet overlay.
    pub(crate) fn sync_overlay(&mut self) {
        let earnings = self.session.runtime().total_earned;
        let active = self.session.is_active();
        self.wallet.set_overlay(earnings, active);
    }

    fn snapshot(&self) -> PersistedSnapshot {
        let runtime = self.session.runtime();
        PersistedSnapshot {
            version: SNAPSHOT_VERSION,
            is_initialized: runtime.is_initialized,
            is_mining: runtime.is_mining,
            session_id: runtime.session_id.clone(),
            session_started_at: runtime.session_started_at,
            mining_rate: runtime.mining_rate,
            total_earned: runtime.total_earned,
            lifetime_earned: runtime.lifetime_earned,
            last_sync_time: runtime.last_sync_time,
            session_history: self.session.history().to_vec(),
            balance: self.wallet.balance(),
        }
    }
}

pub struct MiningEngine<B, S, C> {
    pub(crate) backend: B,
    pub(crate) persistence: Persistence<S>,
    pub(crate) clock: C,
    pub(crate) retry: RetryPolicy,
    pub(crate) stale_after: Duration,
    pub(crate) state: RwLock<EngineState>,
    pub(crate) flights: SingleFlight,
    pub(crate) stats: EngineStats,
}

impl<B, S, C> MiningEngine<B, S, C>
where
    B: SessionBackend + LedgerBackend,
    S: KvStore,
    C: Clock,
{
    /// Build an engine, restoring the last persisted snapshot if there is one.
    pub fn new(backend: B, store: S, clock: C, config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let persistence = Persistence::new(store);
        let mut session = SessionController::new(config.session_length());
        let mut wallet = BalanceReconciler::new();

        if let Some(snapshot) = persistence.load()? {
            tracing::info!(
                mining = snapshot.is_mining,
                sessions = snapshot.session_history.len(),
                "restored persisted state"
            );
            let mut runtime = MiningRuntimeState {
                is_mining: snapshot.is_mining,
                total_earned: snapshot.total_earned,
                lifetime_earned: snapshot.lifetime_earned,
                is_initialized: snapshot.is_initialized,
                last_sync_time: snapshot.last_sync_time,
                data_source: DataSource::Cached,
                session_id: snapshot.session_id,
                session_started_at: snapshot.session_started_at,
                ..Default::default()
            };
            runtime.set_rate(snapshot.mining_rate);
            session.restore(runtime, snapshot.session_history);
            wallet.restore(snapshot.balance);
        }

        let mut state = EngineState { session, wallet };
        state.sync_overlay();

        Ok(Self {
            backend,
            persistence,
            clock,
            retry: config.retry_policy(),
            stale_after: config.stale_after(),
            state: RwLock::new(state),
            flights: SingleFlight::new(),
            stats: EngineStats::default(),
        })
    }

    /// Open a mining session. No-op when one is already active.
    ///
    /// Fetches the rate first if it is not yet known; a non-positive rate
    /// fails the start before any session is requested. `is_mining` becomes
    /// true only after the backend has issued a session id.
    pub async fn start(&self) -> Result<(), EngineError> {
        let _flight = self.flights.enter(FlightKey::Session).await;

        let needs_rate = {
            let mut state = self.state.write().await;
            if !state.session.begin_start()? {
                tracing::debug!("start requested while already mining");
                return Ok(());
            }
            state.session.runtime().mining_rate <= 0.0
        };

        match self.open_session(needs_rate).await {
            Ok((rate, id)) => {
                let now = self.clock.now();
                let mut state = self.state.write().await;
                if let Some(rate) = rate {
                    state.session.runtime_mut().set_rate(rate);
                }
                state.session.confirm_start(id, now, now)?;
                state.sync_overlay();
                EngineStats::increment(&self.stats.sessions_started);
                self.persist(&state);
                Ok(())
            }
            Err(e) => {
                let mut state = self.state.write().await;
                state.session.abort_start(&e.to_string())?;
                state.sync_overlay();
                Err(e)
            }
        }
    }

    async fn open_session(&self, needs_rate: bool) -> Result<(Option<f64>, SessionId), EngineError> {
        let rate = if needs_rate {
            let rate = self.backend.get_mining_rate().await?;
            if !rate.is_finite() || rate <= 0.0 {
                return Err(TypesError::InvalidRate(rate).into());
            }
            Some(rate)
        } else {
            None
        };
        let id = self.backend.create_session().await?;
        Ok((rate, id))
    }

    /// Close the active session. No-op when not mining.
    ///
    /// On confirmed termination the session is appended to history, its
    /// earnings are folded into the lifetime total and credited to the
    /// non-sendable pool until the next balance refresh. If termination fails
    /// the session stays active and the error is returned.
    pub async fn stop(&self) -> Result<(), EngineError> {
        let _flight = self.flights.enter(FlightKey::Session).await;

        let now = self.clock.now();
        let closing = self.state.write().await.session.begin_stop(now)?;
        let Some((id, record)) = closing else {
            tracing::debug!("stop requested while not mining");
            return Ok(());
        };

        match self.backend.terminate_session(&id).await {
            Ok(()) => {
                let mut state = self.state.write().await;
                let earned = record.total_earned();
                if earned > 0.0 {
                    let credited = TokenAmount::from_tokens(earned)
                        .map_err(EngineError::from)
                        .and_then(|amount| state.wallet.credit_mining(amount, &id, now));
                    if let Err(e) = credited {
                        tracing::warn!(session = %id, "failed to credit mining earnings: {e}");
                    }
                }
                state.session.finish_stop(record)?;
                state.sync_overlay();
                EngineStats::increment(&self.stats.sessions_closed);
                self.persist(&state);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(session = %id, "session termination failed: {e}");
                let mut state = self.state.write().await;
                state.session.cancel_stop()?;
                Err(e.into())
            }
        }
    }

    /// Current runtime state with earnings recomputed for now.
    pub async fn runtime(&self) -> MiningRuntimeState {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.session.observe(now);
        state.sync_overlay();
        state.session.runtime().clone()
    }

    pub async fn balance(&self) -> WalletBalance {
        self.state.read().await.wallet.balance()
    }

    /// Confirmed balance plus the live overlay of the running session.
    pub async fn integration(&self) -> MiningIntegration {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.session.observe(now);
        state.sync_overlay();
        state.wallet.integration().clone()
    }

    pub async fn session_history(&self) -> Vec<MiningSession> {
        self.state.read().await.session.history().to_vec()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.read().await.session.phase()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Flush the snapshot. Unlike the writes after each operation, a failure
    /// here is returned.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.session.observe(now);
        self.persistence.save(&state.snapshot())?;
        tracing::info!("engine state flushed");
        Ok(())
    }

    /// Write the snapshot; failures are logged and counted.
    pub(crate) fn persist(&self, state: &EngineState) {
        if let Err(e) = self.persistence.save(&state.snapshot()) {
            EngineStats::increment(&self.stats.persist_failures);
            tracing::warn!("failed to persist engine state: {e}");
        }
    }
}
