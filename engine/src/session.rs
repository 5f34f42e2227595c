//! Mining session state machine.
//!
//! The controller owns the runtime state and the closed-session history but
//! performs no I/O. [`crate::MiningEngine`] drives it around backend calls:
//! `begin_*` before the request, `confirm_*`/`finish_*` on success and
//! `abort_*`/`cancel_*` on failure.

use std::time::Duration;

use accrue_backend::ActiveSession;
use accrue_types::{MiningRuntimeState, MiningSession, SessionId, Timestamp};
use accrue_utils::format_clock;

use crate::accrual;
use crate::EngineError;

/// Where the local session lifecycle currently stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    /// Start requested, waiting for the backend to issue an id.
    Initializing,
    Active,
    /// Stop requested, waiting for the backend to confirm termination.
    Stopping,
    /// Unrecoverable failure; collapses to `Idle` immediately.
    Error,
}

impl SessionPhase {
    fn can_transition_to(self, to: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, to),
            (Idle, Initializing)
                | (Idle, Active)
                | (Initializing, Active)
                | (Initializing, Error)
                | (Active, Stopping)
                | (Active, Idle)
                | (Active, Error)
                | (Stopping, Idle)
                | (Stopping, Active)
                | (Stopping, Error)
                | (Error, Idle)
        )
    }
}

pub struct SessionController {
    phase: SessionPhase,
    runtime: MiningRuntimeState,
    history: Vec<MiningSession>,
    max_session: Duration,
}

impl SessionController {
    pub fn new(max_session: Duration) -> Self {
        Self {
            phase: SessionPhase::Idle,
            runtime: MiningRuntimeState::default(),
            history: Vec::new(),
            max_session,
        }
    }

    /// Rebuild from persisted state. A snapshot claiming to mine without a
    /// session id is treated as idle.
    pub fn restore(&mut self, mut runtime: MiningRuntimeState, history: Vec<MiningSession>) {
        if !runtime.is_consistent() {
            tracing::warn!("persisted state is mining without a session id; resetting session");
            runtime.clear_session();
        }
        let rate = runtime.mining_rate;
        runtime.set_rate(rate);
        self.phase = if runtime.is_mining {
            SessionPhase::Active
        } else {
            SessionPhase::Idle
        };
        self.runtime = runtime;
        self.history = history;
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn runtime(&self) -> &MiningRuntimeState {
        &self.runtime
    }

    /// Sync bookkeeping (loading flags, errors, timestamps). Session fields
    /// are changed only through the transition methods.
    pub(crate) fn runtime_mut(&mut self) -> &mut MiningRuntimeState {
        &mut self.runtime
    }

    pub fn history(&self) -> &[MiningSession] {
        &self.history
    }

    pub fn max_session(&self) -> Duration {
        self.max_session
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    fn transition(&mut self, to: SessionPhase) -> Result<(), EngineError> {
        if !self.phase.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::debug!(from = ?self.phase, ?to, "session phase transition");
        self.phase = to;
        Ok(())
    }

    /// Enter `Initializing`. Returns `false` when a session is already active
    /// and the start should be a no-op.
    pub fn begin_start(&mut self) -> Result<bool, EngineError> {
        if self.phase == SessionPhase::Active {
            return Ok(false);
        }
        self.transition(SessionPhase::Initializing)?;
        Ok(true)
    }

    /// The backend issued `id`; mining is now live.
    pub fn confirm_start(
        &mut self,
        id: SessionId,
        started_at: Timestamp,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        self.transition(SessionPhase::Active)?;
        tracing::info!(session = %id, rate = self.runtime.mining_rate, "mining session started");
        self.runtime.is_mining = true;
        self.runtime.session_id = Some(id);
        self.runtime.session_started_at = Some(started_at);
        self.runtime.total_earned = 0.0;
        self.observe(now);
        Ok(())
    }

    /// The start request failed: pass through `Error` back to `Idle` with
    /// zeroed session fields.
    pub fn abort_start(&mut self, reason: &str) -> Result<(), EngineError> {
        self.transition(SessionPhase::Error)?;
        tracing::warn!(reason, "mining session start failed");
        self.reset_to_idle()
    }

    /// Enter `Stopping` and compute the closing record from the final accrual
    /// value. Returns `None` when no session is active.
    pub fn begin_stop(
        &mut self,
        now: Timestamp,
    ) -> Result<Option<(SessionId, MiningSession)>, EngineError> {
        if self.phase != SessionPhase::Active {
            return Ok(None);
        }
        let (Some(id), Some(started_at)) = (
            self.runtime.session_id.clone(),
            self.runtime.session_started_at,
        ) else {
            self.force_expire();
            return Ok(None);
        };
        let total_earned = self.observe(now);
        let record = MiningSession::new(
            id.clone(),
            started_at,
            Some(now),
            total_earned,
            accrual::session_duration_ms(total_earned, self.runtime.tokens_per_second),
            self.runtime.mining_rate,
        );
        self.transition(SessionPhase::Stopping)?;
        Ok(Some((id, record)))
    }

    /// The backend confirmed termination: record the session and fold its
    /// earnings into the lifetime total.
    pub fn finish_stop(&mut self, record: MiningSession) -> Result<(), EngineError> {
        self.transition(SessionPhase::Idle)?;
        tracing::info!(
            session = %record.id(),
            earned = record.total_earned(),
            duration_ms = record.duration_ms(),
            "mining session stopped"
        );
        self.runtime.lifetime_earned += record.total_earned();
        self.history.push(record);
        self.runtime.clear_session();
        Ok(())
    }

    /// Termination failed: the session is still running.
    pub fn cancel_stop(&mut self) -> Result<(), EngineError> {
        self.transition(SessionPhase::Active)
    }

    /// Recompute earnings and display strings for `now`. Returns the current
    /// session's earnings (zero when idle).
    pub fn observe(&mut self, now: Timestamp) -> f64 {
        let Some(started_at) = self.runtime.session_started_at.filter(|_| self.runtime.is_mining)
        else {
            return 0.0;
        };
        let elapsed = accrual::elapsed_capped(started_at, now, self.max_session);
        self.runtime.total_earned = accrual::accrue(self.runtime.tokens_per_second, elapsed);
        self.runtime.runtime = format_clock(elapsed);
        self.runtime.countdown = format_clock(self.max_session.saturating_sub(elapsed));
        self.runtime.total_earned
    }

    /// Take the backend's view of the session as truth.
    ///
    /// A positive `rate` replaces the local rate. A remote session is adopted
    /// (replacing any different local one); no remote session clears a local
    /// active one.
    pub fn adopt_remote(
        &mut self,
        rate: f64,
        remote: Option<ActiveSession>,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        if rate.is_finite() && rate > 0.0 {
            self.runtime.set_rate(rate);
        }
        match remote {
            Some(active) => {
                if active.rate.is_finite() && active.rate > 0.0 {
                    self.runtime.set_rate(active.rate);
                }
                if self.phase != SessionPhase::Active {
                    self.transition(SessionPhase::Active)?;
                }
                if self.runtime.session_id.as_ref() != Some(&active.session_id) {
                    tracing::info!(session = %active.session_id, "adopting backend session");
                }
                self.runtime.is_mining = true;
                self.runtime.session_id = Some(active.session_id);
                self.runtime.session_started_at = Some(active.started_at);
                self.observe(now);
            }
            None => self.force_expire(),
        }
        Ok(())
    }

    /// Drop a session the backend no longer knows about. Earnings of the
    /// dropped session are discarded; nothing is appended to history.
    pub fn force_expire(&mut self) {
        if self.phase == SessionPhase::Active {
            if let Some(id) = &self.runtime.session_id {
                tracing::info!(session = %id, "session ended on backend; clearing local state");
            }
            self.phase = SessionPhase::Idle;
        }
        self.runtime.clear_session();
    }

    /// Initialization gave up: fall back to safe defaults with a visible error.
    pub fn fail_initialization(&mut self, message: String) {
        self.force_expire();
        self.runtime.network_error = Some(message);
        self.runtime.is_initialized = true;
    }

    fn reset_to_idle(&mut self) -> Result<(), EngineError> {
        self.runtime.clear_session();
        self.transition(SessionPhase::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(86_400);

    fn active(rate: f64) -> SessionController {
        let mut controller = SessionController::new(DAY);
        controller.runtime_mut().set_rate(rate);
        assert!(controller.begin_start().unwrap());
        controller
            .confirm_start(SessionId::new("s1"), Timestamp::from_secs(0), Timestamp::from_secs(0))
            .unwrap();
        controller
    }

    #[test]
    fn start_then_stop_folds_earnings() {
        let mut controller = active(9.0);
        let (id, record) = controller
            .begin_stop(Timestamp::from_secs(1_000))
            .unwrap()
            .unwrap();
        assert_eq!(id, SessionId::new("s1"));
        assert!((record.total_earned() - 2.5).abs() < 1e-9);
        assert_eq!(record.duration_ms(), 1_000_000);
        assert_eq!(controller.phase(), SessionPhase::Stopping);

        controller.finish_stop(record).unwrap();
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert_eq!(controller.history().len(), 1);
        assert!((controller.runtime().lifetime_earned - 2.5).abs() < 1e-9);
        assert_eq!(controller.runtime().total_earned, 0.0);
        assert!(!controller.runtime().is_mining);
    }

    #[test]
    fn begin_start_while_active_is_noop() {
        let mut controller = active(1.0);
        assert!(!controller.begin_start().unwrap());
        assert_eq!(controller.phase(), SessionPhase::Active);
    }

    #[test]
    fn begin_stop_when_idle_is_noop() {
        let mut controller = SessionController::new(DAY);
        assert!(controller.begin_stop(Timestamp::from_secs(5)).unwrap().is_none());
        assert_eq!(controller.phase(), SessionPhase::Idle);
    }

    #[test]
    fn abort_start_returns_to_idle() {
        let mut controller = SessionController::new(DAY);
        controller.begin_start().unwrap();
        controller.abort_start("boom").unwrap();
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert!(controller.runtime().is_consistent());
    }

    #[test]
    fn cancel_stop_keeps_session() {
        let mut controller = active(1.0);
        controller.begin_stop(Timestamp::from_secs(10)).unwrap();
        controller.cancel_stop().unwrap();
        assert_eq!(controller.phase(), SessionPhase::Active);
        assert!(controller.history().is_empty());
        assert_eq!(controller.runtime().session_id, Some(SessionId::new("s1")));
    }

    #[test]
    fn illegal_transition_rejected() {
        let mut controller = SessionController::new(DAY);
        let err = controller.finish_stop(MiningSession::new(
            SessionId::new("x"),
            Timestamp::EPOCH,
            None,
            0.0,
            0,
            1.0,
        ));
        assert!(matches!(
            err,
            Err(EngineError::InvalidTransition {
                from: SessionPhase::Idle,
                to: SessionPhase::Idle
            })
        ));
    }

    #[test]
    fn observe_caps_at_session_length() {
        let mut controller = SessionController::new(Duration::from_secs(3_600));
        controller.runtime_mut().set_rate(1.0);
        controller.begin_start().unwrap();
        controller
            .confirm_start(SessionId::new("s1"), Timestamp::EPOCH, Timestamp::EPOCH)
            .unwrap();
        let earned = controller.observe(Timestamp::from_secs(7_200));
        assert!((earned - 1.0).abs() < 1e-9);
        assert_eq!(controller.runtime().runtime, "01:00:00");
        assert_eq!(controller.runtime().countdown, "00:00:00");
    }

    #[test]
    fn adopt_remote_none_clears_active() {
        let mut controller = active(1.0);
        controller.adopt_remote(1.0, None, Timestamp::from_secs(30)).unwrap();
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert!(!controller.runtime().is_mining);
        assert!(controller.history().is_empty());
    }

    #[test]
    fn adopt_remote_session_from_idle() {
        let mut controller = SessionController::new(DAY);
        let remote = ActiveSession {
            session_id: SessionId::new("remote"),
            rate: 3.6,
            started_at: Timestamp::from_secs(100),
        };
        controller
            .adopt_remote(0.0, Some(remote), Timestamp::from_secs(200))
            .unwrap();
        assert_eq!(controller.phase(), SessionPhase::Active);
        assert!((controller.runtime().total_earned - 0.1).abs() < 1e-9);
        assert!(controller.runtime().is_consistent());
    }

    #[test]
    fn restore_rejects_mining_without_id() {
        let mut controller = SessionController::new(DAY);
        let runtime = MiningRuntimeState {
            is_mining: true,
            total_earned: 4.0,
            ..Default::default()
        };
        controller.restore(runtime, Vec::new());
        assert_eq!(controller.phase(), SessionPhase::Idle);
        assert!(!controller.runtime().is_mining);
    }
}
