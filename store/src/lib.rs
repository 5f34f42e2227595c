//! Durable storage boundary.
//!
//! The engine persists a small snapshot through [`KvStore`]. Every backend
//! (LMDB on device, in-memory for tests) implements this trait and the
//! engine depends only on the trait.

pub mod error;
pub mod kv;

pub use error::StoreError;
pub use kv::KvStore;
