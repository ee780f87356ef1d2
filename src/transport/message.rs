use serde::{Deserialize, Serialize};
use tungstenite::protocol::Message as WsMessage;

use crate::message::Message;
use crate::utils::error::TransportError;

/// Everything that travels between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PeerFrame {
    /// A relayed message with all of its fields.
    #[serde(rename = "envelope")]
    Envelope { message: Message },

    /// Delivery confirmed somewhere downstream.
    #[serde(rename = "ack")]
    Ack { id: String },
}

impl PeerFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_ws(&self) -> Result<WsMessage, TransportError> {
        Ok(WsMessage::Text(serde_json::to_string(self)?.into()))
    }
}
