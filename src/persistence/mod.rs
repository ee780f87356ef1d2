//! The `persistence` module keeps every message this node has originated or
//! relayed, so the relay survives restarts and the UI can list reports.
//!
//! `MessageStore` is the seam the relay depends on. `SledStore` is the
//! embedded, durable implementation used by the node binary.

pub mod sled_store;
pub mod store;

pub use sled_store::SledStore;
pub use store::{MessageStore, SaveOutcome, StoredMessage};
