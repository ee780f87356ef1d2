use serde::{Deserialize, Serialize};

use crate::message::{Message, NewMessage, Priority};
use crate::utils::error::StoreError;

/// A message plus the bookkeeping the store keeps about it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub message: Message,
    pub stored_at_ms: i64,
    pub updated_at_ms: i64,
}

impl StoredMessage {
    pub fn minutes_since_update(&self, now_ms: i64) -> u64 {
        (now_ms.saturating_sub(self.updated_at_ms).max(0) / 60_000) as u64
    }
}

/// Result of offering a message to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    /// The id was known with a lower priority; only the priority was raised.
    Escalated { previous: Priority },
    /// The id was known with the same or a higher priority.
    Unchanged,
}

/// Durable message repository shared by the relay and UI code.
///
/// Every write is a single storage transaction, so read-modify-write
/// operations such as `mark_delivered` never race with each other.
pub trait MessageStore: Send + Sync {
    /// Assign identity to locally entered fields and persist the result.
    fn create(&self, fields: NewMessage) -> Result<Message, StoreError>;

    /// Insert if absent; escalate priority if present with a lower one.
    fn save(&self, message: &Message) -> Result<SaveOutcome, StoreError>;

    fn get(&self, id: &str) -> Result<Option<StoredMessage>, StoreError>;

    /// Newest first.
    fn get_by_priority(&self, priority: Priority) -> Result<Vec<Message>, StoreError>;

    /// Newest first, at most `limit` entries.
    fn get_recent(&self, limit: usize) -> Result<Vec<Message>, StoreError>;

    /// Returns `true` only for the call that flipped the flag.
    fn mark_delivered(&self, id: &str) -> Result<bool, StoreError>;

    /// Raise the stored priority. Lower or equal values are ignored.
    fn escalate(&self, id: &str, priority: Priority) -> Result<bool, StoreError>;

    /// Record that the message was looked at without changing it.
    fn touch(&self, id: &str) -> Result<(), StoreError>;

    fn undelivered(&self) -> Result<Vec<StoredMessage>, StoreError>;

    /// Remove messages created before `cutoff_ms`. Returns how many went.
    fn prune_older_than(&self, cutoff_ms: i64) -> Result<usize, StoreError>;
}
