//! The `auth` module decides whether a relayed message really comes from a
//! trusted origin.
//!
//! The relay only depends on the `SignatureVerifier` trait. The Ed25519
//! implementation here signs the fields that never change while a message
//! hops between peers, so `ttl`, `hops`, `priority` and `source` can be
//! updated in transit without breaking the signature.

pub mod signing;

pub use signing::{Ed25519Verifier, MessageSigner, canonical_bytes, parse_public_key};

use crate::message::Message;

/// Authenticity check used by the relay before anything is stored.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, message: &Message) -> bool;
}
