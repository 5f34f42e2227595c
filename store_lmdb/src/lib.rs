//! LMDB storage backend for the accrue engine.
//!
//! Implements [`accrue_store::KvStore`] using the `heed` LMDB bindings. All
//! keys live in a single named database inside one environment.

pub mod environment;
pub mod error;
pub mod meta;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use meta::{LmdbKvStore, CURRENT_SCHEMA_VERSION};
