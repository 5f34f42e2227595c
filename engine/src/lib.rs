//! Mining accrual and wallet reconciliation engine.
//!
//! Tracks a time-bounded mining session, computes live earnings between
//! synchronization points, and keeps a cached wallet balance consistent with
//! the backend ledger across restarts, network failures and server-side
//! session expiry.
//!
//! Components:
//! - [`accrual`]: pure earnings computation anchored to wall-clock time
//! - [`session`]: the mining session state machine and history
//! - [`reconciler`]: the three-pool balance, exchanges and sends
//! - [`sync`]: launch-time synchronization with bounded retry
//! - [`expiry`]: background correction of silently expired sessions
//! - [`persistence`]: the durable snapshot used to resume after restart
//!
//! All of them operate on one [`MiningEngine`], constructed with an injected
//! backend, store and clock.

pub mod accrual;
pub mod config;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod flight;
pub mod persistence;
pub mod reconciler;
pub mod session;
pub mod shutdown;
pub mod stats;
pub mod sync;

pub use config::EngineConfig;
pub use engine::MiningEngine;
pub use error::EngineError;
pub use expiry::{ExpiryOutcome, ExpiryWatcher};
pub use flight::{FlightKey, SingleFlight};
pub use persistence::{PersistedSnapshot, Persistence};
pub use reconciler::BalanceReconciler;
pub use session::{SessionController, SessionPhase};
pub use shutdown::ShutdownController;
pub use stats::EngineStats;
pub use sync::{InitOutcome, RetryPolicy};
