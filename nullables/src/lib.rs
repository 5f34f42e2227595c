//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the engine (clock, backend, storage) sits
//! behind a trait. This crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically, including injected failures
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod backend;
pub mod clock;
pub mod store;

pub use backend::{BackendCall, NullBackend};
pub use clock::NullClock;
pub use store::NullKvStore;
