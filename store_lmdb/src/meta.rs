//! LMDB implementation of KvStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use accrue_store::{KvStore, StoreError};

use crate::LmdbError;

/// The schema version that the current code expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const SCHEMA_VERSION_KEY: &[u8] = b"__schema_version";

pub struct LmdbKvStore {
    pub(crate) env: Arc<Env>,
    pub(crate) kv_db: Database<Bytes, Bytes>,
}

impl LmdbKvStore {
    /// Read the stored schema version; a fresh database reports 0.
    pub fn schema_version(&self) -> Result<u32, LmdbError> {
        let rtxn = self.env.read_txn()?;
        match self.kv_db.get(&rtxn, SCHEMA_VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization(
                        "schema version has unexpected byte length".to_string(),
                    )
                })?;
                Ok(u32::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    /// Stamp a fresh database with the current version and refuse databases
    /// written by newer code.
    pub(crate) fn check_schema(&self) -> Result<(), LmdbError> {
        let found = self.schema_version()?;
        if found == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }
        if found > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::UnsupportedSchema {
                found,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        let mut wtxn = self.env.write_txn()?;
        self.kv_db.put(
            &mut wtxn,
            SCHEMA_VERSION_KEY,
            &CURRENT_SCHEMA_VERSION.to_le_bytes(),
        )?;
        wtxn.commit()?;
        tracing::info!(from = found, to = CURRENT_SCHEMA_VERSION, "schema stamped");
        Ok(())
    }
}

impl KvStore for LmdbKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let value = self
            .kv_db
            .get(&rtxn, key.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.kv_db
            .put(&mut wtxn, key.as_bytes(), value)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.kv_db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    fn temp_store() -> (tempfile::TempDir, LmdbKvStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = LmdbEnvironment::open_default(dir.path()).expect("open env");
        let store = env.kv_store().expect("kv store");
        (dir, store)
    }

    #[test]
    fn set_then_get() {
        let (_dir, store) = temp_store();
        store.set("snapshot", b"payload").unwrap();
        assert_eq!(store.get("snapshot").unwrap(), Some(b"payload".to_vec()));
    }

    #[test]
    fn missing_key_is_none() {
        let (_dir, store) = temp_store();
        assert_eq!(store.get("absent").unwrap(), None);
    }

    #[test]
    fn delete_missing_key_is_ok() {
        let (_dir, store) = temp_store();
        store.delete("absent").unwrap();
        store.set("k", b"v").unwrap();
        store.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn fresh_database_is_stamped() {
        let (_dir, store) = temp_store();
        assert_eq!(store.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        {
            let env = LmdbEnvironment::open_default(dir.path()).unwrap();
            env.kv_store().unwrap().set("k", b"durable").unwrap();
        }
        let env = LmdbEnvironment::open_default(dir.path()).unwrap();
        assert_eq!(env.kv_store().unwrap().get("k").unwrap(), Some(b"durable".to_vec()));
    }

    #[test]
    fn newer_schema_is_refused() {
        let (dir, store) = temp_store();
        let mut wtxn = store.env.write_txn().unwrap();
        store
            .kv_db
            .put(&mut wtxn, SCHEMA_VERSION_KEY, &99u32.to_le_bytes())
            .unwrap();
        wtxn.commit().unwrap();
        drop(store);

        let env = LmdbEnvironment::open_default(dir.path()).unwrap();
        assert!(matches!(
            env.kv_store(),
            Err(LmdbError::UnsupportedSchema { found: 99, .. })
        ));
    }
}
