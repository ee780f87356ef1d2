//! The `transport` module carries messages between neighbouring nodes.
//!
//! The relay talks to peers only through `PeerTransport`, so the flood logic
//! can be driven by an in-memory transport in tests and by the WebSocket
//! transport in the node binary. Frames on the wire are JSON `PeerFrame`s.

pub mod message;
pub mod websocket;

use async_trait::async_trait;

use crate::message::Message;
use crate::utils::error::TransportError;

pub use message::PeerFrame;
pub use websocket::{WsTransport, connect_peer, start_peer_server};

pub type PeerId = String;

/// Best-effort delivery to directly connected peers.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Peers a message could be sent to right now.
    async fn reachable_peers(&self) -> Vec<PeerId>;

    /// Send one message to one peer. A failure affects only that peer.
    async fn broadcast(&self, peer: &PeerId, message: &Message) -> Result<(), TransportError>;
}
