use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running counters, updated lock-free from every relay path.
#[derive(Debug, Default)]
pub struct RelayStats {
    pub(crate) originated: AtomicU64,
    pub(crate) received: AtomicU64,
    pub(crate) duplicates: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) malformed: AtomicU64,
    pub(crate) stored: AtomicU64,
    pub(crate) forwarded: AtomicU64,
    pub(crate) expired: AtomicU64,
    pub(crate) broadcast_failures: AtomicU64,
    pub(crate) escalations: AtomicU64,
    pub(crate) acknowledged: AtomicU64,
}

/// Point-in-time copy of `RelayStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub originated: u64,
    pub received: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub malformed: u64,
    pub stored: u64,
    pub forwarded: u64,
    pub expired: u64,
    pub broadcast_failures: u64,
    pub escalations: u64,
    pub acknowledged: u64,
}

impl RelayStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let read = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            originated: read(&self.originated),
            received: read(&self.received),
            duplicates: read(&self.duplicates),
            rejected: read(&self.rejected),
            malformed: read(&self.malformed),
            stored: read(&self.stored),
            forwarded: read(&self.forwarded),
            expired: read(&self.expired),
            broadcast_failures: read(&self.broadcast_failures),
            escalations: read(&self.escalations),
            acknowledged: read(&self.acknowledged),
        }
    }
}
