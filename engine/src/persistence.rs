//! Persistence adapter: the durable snapshot used to resume after restart.
//!
//! Only the fields needed to resume are written. Loading flags, network
//! errors and retry counters are never persisted, so a restart cannot come
//! back up in a stale error or loading state.

use serde::{Deserialize, Serialize};

use accrue_store::{KvStore, StoreError};
use accrue_types::{MiningSession, SessionId, Timestamp, WalletBalance};

/// Storage key of the snapshot.
pub const SNAPSHOT_KEY: &str = "accrue/runtime_snapshot";

/// Bumped whenever the snapshot layout changes; older snapshots are ignored.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub version: u32,
    pub is_initialized: bool,
    pub is_mining: bool,
    pub session_id: Option<SessionId>,
    pub session_started_at: Option<Timestamp>,
    pub mining_rate: f64,
    pub total_earned: f64,
    pub lifetime_earned: f64,
    pub last_sync_time: Option<Timestamp>,
    pub session_history: Vec<MiningSession>,
    pub balance: WalletBalance,
}

/// Owns the durable store and reads/writes the snapshot through it.
pub struct Persistence<S> {
    store: S,
}

impl<S: KvStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read the snapshot written by a previous run.
    ///
    /// A missing key, an unreadable snapshot or one written with another
    /// layout version all yield `None`; the engine then starts from defaults.
    pub fn load(&self) -> Result<Option<PersistedSnapshot>, StoreError> {
        let Some(bytes) = self.store.get(SNAPSHOT_KEY)? else {
            return Ok(None);
        };
        match bincode::deserialize::<PersistedSnapshot>(&bytes) {
            Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => Ok(Some(snapshot)),
            Ok(snapshot) => {
                tracing::warn!(
                    found = snapshot.version,
                    expected = SNAPSHOT_VERSION,
                    "ignoring snapshot with unknown version"
                );
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("ignoring unreadable snapshot: {e}");
                Ok(None)
            }
        }
    }

    pub fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), StoreError> {
        let bytes =
            bincode::serialize(snapshot).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store.set(SNAPSHOT_KEY, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrue_nullables::NullKvStore;
    use accrue_types::TokenAmount;

    fn snapshot() -> PersistedSnapshot {
        PersistedSnapshot {
            version: SNAPSHOT_VERSION,
            is_initialized: true,
            is_mining: true,
            session_id: Some(SessionId::new("session-7")),
            session_started_at: Some(Timestamp::from_secs(100)),
            mining_rate: 0.5,
            total_earned: 0.25,
            lifetime_earned: 4.0,
            last_sync_time: Some(Timestamp::from_secs(90)),
            session_history: vec![MiningSession::new(
                SessionId::new("session-6"),
                Timestamp::from_secs(1),
                Some(Timestamp::from_secs(50)),
                4.0,
                49_000,
                0.5,
            )],
            balance: WalletBalance::new(TokenAmount::whole(1), TokenAmount::whole(2), TokenAmount::ZERO)
                .unwrap(),
        }
    }

    #[test]
    fn missing_snapshot_is_none() {
        let persistence = Persistence::new(NullKvStore::new());
        assert_eq!(persistence.load().unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let persistence = Persistence::new(NullKvStore::new());
        persistence.save(&snapshot()).unwrap();
        assert_eq!(persistence.load().unwrap(), Some(snapshot()));
    }

    #[test]
    fn garbage_bytes_are_ignored() {
        let store = NullKvStore::new();
        store.set(SNAPSHOT_KEY, &[0xFF, 0x01]).unwrap();
        let persistence = Persistence::new(store);
        assert_eq!(persistence.load().unwrap(), None);
    }

    #[test]
    fn other_version_is_ignored() {
        let persistence = Persistence::new(NullKvStore::new());
        let mut old = snapshot();
        old.version = SNAPSHOT_VERSION + 1;
        persistence.save(&old).unwrap();
        assert_eq!(persistence.load().unwrap(), None);
    }

    #[test]
    fn write_failure_surfaces() {
        let store = NullKvStore::new();
        store.set_fail_writes(true);
        let persistence = Persistence::new(store);
        assert!(persistence.save(&snapshot()).is_err());
    }
}
