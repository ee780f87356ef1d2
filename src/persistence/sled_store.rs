//! Message store backed by `sled`
//!
//! Two trees:
//! - `messages`: message id -> JSON `StoredMessage`
//! - `recent`: `{created_at_ms:020}_{id}` -> id, so iteration yields messages
//!   in chronological order (reverse for newest-first)
//!
//! Every write touches both trees inside one sled transaction and then
//! flushes, so a call that returns `Ok` has reached disk.

use chrono::Utc;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Db, Transactional, Tree};
use tracing::debug;

use crate::message::{Message, NewMessage, Priority};
use crate::persistence::store::{MessageStore, SaveOutcome, StoredMessage};
use crate::utils::error::StoreError;

const MESSAGES_TREE: &str = "messages";
const RECENT_TREE: &str = "recent";

type TxResult<T> = Result<T, ConflictableTransactionError<StoreError>>;

#[derive(Clone)]
pub struct SledStore {
    db: Db,
    messages: Tree,
    recent: Tree,
}

impl SledStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let messages = db.open_tree(MESSAGES_TREE)?;
        let recent = db.open_tree(RECENT_TREE)?;
        Ok(Self {
            db,
            messages,
            recent,
        })
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Run `op` as one transaction over both trees, then flush.
    fn commit<T>(
        &self,
        op: impl Fn(&TransactionalTree, &TransactionalTree) -> TxResult<T>,
    ) -> Result<T, StoreError> {
        let value = (&self.messages, &self.recent)
            .transaction(|(messages, recent)| op(messages, recent))
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => StoreError::Sled(e),
            })?;
        self.db.flush()?;
        Ok(value)
    }

    /// Apply `change` to a stored record. `change` returns whether to write.
    fn update<T>(
        &self,
        id: &str,
        change: impl Fn(&mut StoredMessage, i64) -> (bool, T),
    ) -> Result<T, StoreError> {
        self.commit(|messages, _| {
            let mut stored = match messages.get(id.as_bytes())? {
                Some(bytes) => decode_stored(&bytes).map_err(abort)?,
                None => return Err(abort(StoreError::NotFound(id.to_string()))),
            };
            let (write, result) = change(&mut stored, now_ms());
            if write {
                messages.insert(id.as_bytes(), encode_stored(&stored).map_err(abort)?)?;
            }
            Ok(result)
        })
    }

    fn load(&self, id: &[u8]) -> Result<Option<StoredMessage>, StoreError> {
        match self.messages.get(id)? {
            Some(bytes) => Ok(Some(decode_stored(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every stored record. A read error or a corrupt record fails the call.
    fn all(&self) -> Result<Vec<StoredMessage>, StoreError> {
        self.messages
            .iter()
            .map(|res| {
                let (_, val) = res?;
                decode_stored(&val)
            })
            .collect()
    }
}

impl MessageStore for SledStore {
    fn create(&self, fields: NewMessage) -> Result<Message, StoreError> {
        let message = fields.into_message(now_ms());
        self.save(&message)?;
        Ok(message)
    }

    fn save(&self, message: &Message) -> Result<SaveOutcome, StoreError> {
        let id = message.id.as_bytes();
        let index_key = recent_key(message.created_at_ms, &message.id);

        let outcome = self.commit(|messages, recent| {
            let now = now_ms();
            match messages.get(id)? {
                None => {
                    let stored = StoredMessage {
                        message: message.clone(),
                        stored_at_ms: now,
                        updated_at_ms: now,
                    };
                    messages.insert(id, encode_stored(&stored).map_err(abort)?)?;
                    recent.insert(index_key.as_bytes(), id)?;
                    Ok(SaveOutcome::Inserted)
                }
                Some(bytes) => {
                    let mut stored = decode_stored(&bytes).map_err(abort)?;
                    let previous = stored.message.priority;
                    if message.priority <= previous {
                        return Ok(SaveOutcome::Unchanged);
                    }
                    stored.message.priority = message.priority;
                    // a re-signed copy from the origin replaces the old claim
                    if message.origin_priority > stored.message.origin_priority {
                        stored.message.origin_priority = message.origin_priority;
                        stored.message.signature = message.signature.clone();
                    }
                    stored.updated_at_ms = now;
                    messages.insert(id, encode_stored(&stored).map_err(abort)?)?;
                    Ok(SaveOutcome::Escalated { previous })
                }
            }
        })?;

        debug!("save {} -> {:?}", message.id, outcome);
        Ok(outcome)
    }

    fn get(&self, id: &str) -> Result<Option<StoredMessage>, StoreError> {
        self.load(id.as_bytes())
    }

    fn get_by_priority(&self, priority: Priority) -> Result<Vec<Message>, StoreError> {
        let mut matching: Vec<Message> = self
            .all()?
            .into_iter()
            .map(|stored| stored.message)
            .filter(|m| m.priority == priority)
            .collect();
        matching.sort_by(|a, b| {
            b.created_at_ms
                .cmp(&a.created_at_ms)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(matching)
    }

    fn get_recent(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        let mut out = Vec::with_capacity(limit.min(self.recent.len()));
        for entry in self.recent.iter().rev() {
            if out.len() >= limit {
                break;
            }
            let (_, id) = entry?;
            if let Some(stored) = self.load(&id)? {
                out.push(stored.message);
            }
        }
        Ok(out)
    }

    fn mark_delivered(&self, id: &str) -> Result<bool, StoreError> {
        self.update(id, |stored, now| {
            if stored.message.delivered {
                return (false, false);
            }
            stored.message.delivered = true;
            stored.updated_at_ms = now;
            (true, true)
        })
    }

    fn escalate(&self, id: &str, priority: Priority) -> Result<bool, StoreError> {
        self.update(id, |stored, now| {
            if priority <= stored.message.priority {
                return (false, false);
            }
            stored.message.priority = priority;
            stored.updated_at_ms = now;
            (true, true)
        })
    }

    fn touch(&self, id: &str) -> Result<(), StoreError> {
        self.update(id, |stored, now| {
            stored.updated_at_ms = now;
            (true, ())
        })
    }

    fn undelivered(&self) -> Result<Vec<StoredMessage>, StoreError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|s| !s.message.delivered)
            .collect())
    }

    fn prune_older_than(&self, cutoff_ms: i64) -> Result<usize, StoreError> {
        let upper = recent_key(cutoff_ms, "");
        let expired = self
            .recent
            .range(..upper.as_bytes())
            .collect::<Result<Vec<(sled::IVec, sled::IVec)>, _>>()?;

        if expired.is_empty() {
            return Ok(0);
        }

        self.commit(|messages, recent| {
            for (key, id) in &expired {
                recent.remove(key.clone())?;
                messages.remove(id.clone())?;
            }
            Ok(())
        })?;

        debug!("pruned {} messages older than {}", expired.len(), cutoff_ms);
        Ok(expired.len())
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .finish()
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn recent_key(created_at_ms: i64, id: &str) -> String {
    format!("{:020}_{}", created_at_ms.max(0), id)
}

fn encode_stored(stored: &StoredMessage) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(stored)?)
}

fn decode_stored(bytes: &[u8]) -> Result<StoredMessage, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn abort(e: StoreError) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(e)
}
