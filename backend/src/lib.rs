//! Backend boundary for the accrue engine.
//!
//! The engine never talks to the network directly. It consumes the
//! [`SessionBackend`] and [`LedgerBackend`] traits and a [`Clock`]; this crate
//! defines those seams, the wire types that cross them, and [`HttpBackend`],
//! the production implementation over JSON/HTTP.

pub mod clock;
pub mod error;
pub mod http;
pub mod traits;
pub mod wire;

pub use clock::{Clock, SystemClock};
pub use error::BackendError;
pub use http::HttpBackend;
pub use traits::{LedgerBackend, SessionBackend};
pub use wire::{ActiveSession, BalanceSnapshot, SendReceipt};
