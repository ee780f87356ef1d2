use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;

use crate::utils::error::TransportError;

/// A neighbour reachable over an open WebSocket.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Connection-scoped id, e.g. `peer-<uuid>`. A reconnect gets a new one.
    pub id: String,

    /// Frames queued here are written to the socket by the connection task.
    pub sender: UnboundedSender<WsMessage>,
}

impl Peer {
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("peer-{}", uuid::Uuid::new_v4()),
            sender,
        }
    }

    pub fn send(&self, frame: WsMessage) -> Result<(), TransportError> {
        self.sender
            .send(frame)
            .map_err(|_| TransportError::ChannelClosed(self.id.clone()))
    }

    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
