//! Key-value storage trait.

use crate::StoreError;

/// Byte-oriented durable key-value storage.
///
/// Writes must be durable when `set` returns. Implementations are shared
/// across tasks, hence the `Send + Sync` bound.
pub trait KvStore: Send + Sync {
    /// Retrieve a value; `Ok(None)` when the key was never written.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store a value, replacing any previous one.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Delete a value. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: KvStore + ?Sized> KvStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }
}
