//! The `peer` module defines a connected neighbour in the mesh.
//!
//! A `Peer` is the relay-facing half of one WebSocket connection: an id and
//! the channel its writer task drains.

pub mod connection;
pub use connection::Peer;
