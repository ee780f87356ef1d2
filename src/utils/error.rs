//! The `error` module defines the error types used across `sosrelay`.
//!
//! Each concern gets its own enum so callers can match on what actually went
//! wrong. Conversions between layers go through `#[from]` so `?` works at the
//! seams (store -> relay, message -> relay, codec -> relay).
//!
//! Malformed compact payloads are deliberately absent here: decoding returns
//! `None` instead of an error.

use thiserror::Error;

/// Failures of the durable message store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage engine error: {0}")]
    Sled(#[from] sled::Error),

    #[error("failed to (de)serialize stored message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("message {0} not found")]
    NotFound(String),
}

/// Failures while producing a compact channel payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("encoded payload is {length} characters, channel limit is {limit}")]
    PayloadTooLong { length: usize, limit: usize },

    #[error("field cannot be encoded: {0}")]
    InvalidField(String),
}

/// Structural violations of the message model.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message id is empty")]
    EmptyId,

    #[error("latitude outside [-90, 90]")]
    LatitudeOutOfRange,

    #[error("longitude outside [-180, 180]")]
    LongitudeOutOfRange,

    #[error("location accuracy must be a non-negative number")]
    InvalidAccuracy,

    #[error("people count must be at least 1")]
    NoPeople,

    #[error("battery percent must be within 0..=100")]
    BatteryOutOfRange,
}

/// Per-peer delivery failures. Never fatal to a relay attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer {0} is not reachable")]
    PeerUnavailable(String),

    #[error("channel to peer {0} is closed")]
    ChannelClosed(String),

    #[error("failed to serialize frame: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key material and signature format problems.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

/// Failures surfaced by the flood relay to its caller.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid message: {0}")]
    InvalidMessage(#[from] MessageError),

    #[error("ttl {ttl} plus hops {hops} exceeds the hop budget")]
    HopBudget { ttl: u32, hops: u32 },

    #[error("SMS fallback failed: {0}")]
    Codec(#[from] CodecError),
}
