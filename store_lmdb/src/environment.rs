//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::meta::LmdbKvStore;
use crate::LmdbError;

/// Default map size: the snapshot is tiny, 16 MiB leaves ample headroom.
pub const DEFAULT_MAP_SIZE: usize = 16 * 1024 * 1024;

const KV_DB_NAME: &str = "kv";

/// Wraps the LMDB environment and the key-value database handle.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    kv_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment in `path`.
    ///
    /// The directory is created if missing.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process for this path and
        // never memory-mapped elsewhere.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(2)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let kv_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some(KV_DB_NAME))?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            kv_db,
        })
    }

    /// Open with [`DEFAULT_MAP_SIZE`].
    pub fn open_default(path: &Path) -> Result<Self, LmdbError> {
        Self::open(path, DEFAULT_MAP_SIZE)
    }

    /// Build the key-value store and bring its schema up to date.
    pub fn kv_store(&self) -> Result<LmdbKvStore, LmdbError> {
        let store = LmdbKvStore {
            env: Arc::clone(&self.env),
            kv_db: self.kv_db,
        };
        store.check_schema()?;
        Ok(store)
    }
}
