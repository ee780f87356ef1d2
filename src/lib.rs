//! # sosrelay
//!
//! `sosrelay` relays emergency help requests across a mesh of nearby devices
//! when normal networks are down. Every node triages what it hears, stores
//! it durably, and floods it onward with a bounded hop budget. When no peer
//! is reachable a message can be squeezed into a single SMS-sized text.
//!
//! ## Modules
//!
//! - `message`: the emergency `Message`, its kinds, priorities and flags.
//! - `triage`: pure scoring of urgency and the time-driven escalation rules.
//! - `codec`: compact `SOS1:` text form for SMS-class channels and text splitting.
//! - `persistence`: the `MessageStore` contract and its `sled` implementation.
//! - `relay`: the flood relay (dedup, verification, fan-out, maintenance).
//! - `auth`: Ed25519 origin signatures.
//! - `transport` / `peer`: peer connections over WebSockets.
//! - `config`: layered node settings.
//! - `utils`: error types and logging setup.

pub mod auth;
pub mod codec;
pub mod config;
pub mod message;
pub mod peer;
pub mod persistence;
pub mod relay;
pub mod transport;
pub mod triage;
pub mod utils;
