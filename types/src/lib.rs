//! Fundamental types for the accrue mining engine.
//!
//! This crate defines the data model shared across every other crate in the
//! workspace: token amounts, timestamps, mining sessions, runtime state,
//! wallet balances and the append-only transaction log.

pub mod amount;
pub mod balance;
pub mod error;
pub mod integration;
pub mod runtime;
pub mod session;
pub mod time;
pub mod transaction;

pub use amount::TokenAmount;
pub use balance::{Pool, WalletBalance};
pub use error::TypesError;
pub use integration::MiningIntegration;
pub use runtime::{DataSource, MiningRuntimeState};
pub use session::{MiningSession, SessionId};
pub use time::Timestamp;
pub use transaction::{ExchangeLeg, Transaction, TransactionKind, TransactionLog};
