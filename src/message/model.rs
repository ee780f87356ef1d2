//! Message definitions for the relay
//!
//! `Message` is the canonical in-memory and persisted representation of an
//! emergency report. The same struct travels in peer envelopes; the compact
//! SMS form is a reduced projection produced by the codec.
//!
//! Notes on fields:
//! - `id`: opaque, globally unique, never regenerated when relayed
//! - `ttl` counts down per hop, `hops` counts up; both travel so receivers can
//!   cross-check them
//! - `priority` only ever moves up over a message's lifetime
//! - `origin_priority` is what the origin signed; relays never change it
//! - `delivered` is settled by the store, never by a peer

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::error::MessageError;

/// What the report is about. Adding a kind forces every consumer to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    HelpRequest,
    StatusPing,
    ResourcePost,
}

impl MessageKind {
    pub fn tag(self) -> u8 {
        match self {
            MessageKind::HelpRequest => 0,
            MessageKind::StatusPing => 1,
            MessageKind::ResourcePost => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(MessageKind::HelpRequest),
            1 => Some(MessageKind::StatusPing),
            2 => Some(MessageKind::ResourcePost),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn ordinal(self) -> u8 {
        match self {
            Priority::Normal => 0,
            Priority::High => 1,
            Priority::Critical => 2,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Priority::Normal),
            1 => Some(Priority::High),
            2 => Some(Priority::Critical),
            _ => None,
        }
    }

    /// Next level up, saturating at `Critical`.
    pub fn escalated(self) -> Self {
        match self {
            Priority::Normal => Priority::High,
            Priority::High | Priority::Critical => Priority::Critical,
        }
    }
}

/// Independent situational flags. The bitmask form only exists on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub under_rubble: bool,
    pub injured: bool,
    pub anonymity: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
}

/// Where this node got the message from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "self")]
    SelfOrigin,
    #[serde(rename = "peer")]
    Peer,
    #[serde(rename = "server")]
    Server,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub kind: MessageKind,
    pub created_at_ms: i64,
    pub location: Location,
    pub priority: Priority,
    pub origin_priority: Priority,
    pub flags: Flags,
    pub people_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<u8>,
    pub ttl: u32,
    pub hops: u32,
    #[serde(default)]
    pub signature: String,
    pub source: Source,
    #[serde(default)]
    pub delivered: bool,
}

impl Message {
    /// Check the ranges every node relies on before storing or relaying.
    pub fn validate(&self) -> Result<(), MessageError> {
        if self.id.is_empty() {
            return Err(MessageError::EmptyId);
        }
        if !(-90.0..=90.0).contains(&self.location.latitude) {
            return Err(MessageError::LatitudeOutOfRange);
        }
        if !(-180.0..=180.0).contains(&self.location.longitude) {
            return Err(MessageError::LongitudeOutOfRange);
        }
        if !self.location.accuracy_meters.is_finite() || self.location.accuracy_meters < 0.0 {
            return Err(MessageError::InvalidAccuracy);
        }
        if self.people_count == 0 {
            return Err(MessageError::NoPeople);
        }
        if self.battery_percent.is_some_and(|b| b > 100) {
            return Err(MessageError::BatteryOutOfRange);
        }
        Ok(())
    }

    /// A message with no relay budget left is kept for display only.
    pub fn is_expired(&self) -> bool {
        self.ttl == 0
    }

    /// Whole minutes since origin; clock skew into the future counts as zero.
    pub fn age_minutes(&self, now_ms: i64) -> u64 {
        let elapsed = now_ms.saturating_sub(self.created_at_ms).max(0);
        (elapsed / 60_000) as u64
    }

    /// The copy handed to peers on the next hop.
    pub fn next_hop(&self) -> Option<Message> {
        if self.is_expired() {
            return None;
        }
        let mut forwarded = self.clone();
        forwarded.ttl -= 1;
        forwarded.hops += 1;
        forwarded.delivered = false;
        Some(forwarded)
    }
}

/// Fields a caller supplies when creating a report locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub kind: MessageKind,
    pub location: Location,
    #[serde(default)]
    pub flags: Flags,
    pub people_count: u32,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub battery_percent: Option<u8>,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub ttl: u32,
}

fn default_priority() -> Priority {
    Priority::Normal
}

impl NewMessage {
    /// Assign identity and origin metadata. Signature is left for the signer.
    pub fn into_message(self, now_ms: i64) -> Message {
        Message {
            id: Uuid::new_v4().to_string(),
            kind: self.kind,
            created_at_ms: now_ms,
            location: self.location,
            priority: self.priority,
            origin_priority: self.priority,
            flags: self.flags,
            people_count: self.people_count,
            note: self.note,
            battery_percent: self.battery_percent,
            ttl: self.ttl,
            hops: 0,
            signature: String::new(),
            source: Source::SelfOrigin,
            delivered: false,
        }
    }
}
