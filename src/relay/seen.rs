//! Bounded dedup memory.
//!
//! The check and the insert happen under one lock, and eviction is part of
//! the insert, so two arrivals of the same id can never both be treated as
//! new.

use std::num::NonZeroUsize;

use lru::LruCache;
use tokio::sync::Mutex;

use crate::message::Priority;
use crate::relay::policy::SameIdPolicy;

/// Result of trying to claim an id for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Fresh,
    /// Known id, but this arrival carries a strictly higher priority.
    Escalation { previous: Priority },
    Duplicate,
}

#[derive(Debug)]
pub struct SeenSet {
    entries: Mutex<LruCache<String, Priority>>,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn claim(&self, id: &str, priority: Priority, policy: SameIdPolicy) -> Claim {
        let mut entries = self.entries.lock().await;
        match entries.get(id).copied() {
            None => {
                entries.put(id.to_string(), priority);
                Claim::Fresh
            }
            Some(previous) if policy == SameIdPolicy::Escalate && priority > previous => {
                entries.put(id.to_string(), priority);
                Claim::Escalation { previous }
            }
            Some(_) => Claim::Duplicate,
        }
    }

    /// Undo a claim whose message was never stored.
    pub async fn release(&self, id: &str, claim: Claim) {
        let mut entries = self.entries.lock().await;
        match claim {
            Claim::Fresh => {
                entries.pop(id);
            }
            Claim::Escalation { previous } => {
                entries.put(id.to_string(), previous);
            }
            Claim::Duplicate => {}
        }
    }

    /// Record `priority` for `id`, never lowering what is already known.
    pub async fn raise(&self, id: &str, priority: Priority) {
        let mut entries = self.entries.lock().await;
        let highest = entries.peek(id).map_or(priority, |known| priority.max(*known));
        entries.put(id.to_string(), highest);
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.entries.lock().await.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
