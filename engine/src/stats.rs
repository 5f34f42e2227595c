//! Engine operation counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for engine activity.
#[derive(Default)]
pub struct EngineStats {
    pub sessions_started: AtomicU64,
    pub sessions_closed: AtomicU64,
    pub sync_attempts: AtomicU64,
    pub sync_failures: AtomicU64,
    pub expiry_corrections: AtomicU64,
    pub persist_failures: AtomicU64,
}

impl EngineStats {
    pub fn increment(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HashMap<&'static str, u64> {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        HashMap::from([
            ("sessions_started", load(&self.sessions_started)),
            ("sessions_closed", load(&self.sessions_closed)),
            ("sync_attempts", load(&self.sync_attempts)),
            ("sync_failures", load(&self.sync_failures)),
            ("expiry_corrections", load(&self.expiry_corrections)),
            ("persist_failures", load(&self.persist_failures)),
        ])
    }
}
