//! Compact SMS codec
//!
//! A message is reduced to the fields needed to rebuild it, written as a
//! `|`-separated record, packed five bits per symbol and tagged with a literal
//! prefix:
//!
//! ```text
//! SOS1:<base32 of "kind|shortId|seconds|latE4|lonE4|accBucket|priority|flags|people|ttl|battery[|note]">
//! ```
//!
//! Quantization: timestamp to whole seconds, coordinates to 4 decimals,
//! accuracy to 10 m buckets. The note, when present, is the last field and may
//! contain `|` itself.
//!
//! Known limitation: only the first 8 characters of the id survive. Two
//! messages sharing that prefix are indistinguishable after an SMS hop.

use crate::codec::base32;
use crate::message::{Flags, Location, Message, MessageKind, Priority, Source};
use crate::utils::error::CodecError;

pub const PREFIX: &str = "SOS1:";
pub const CHANNEL_LIMIT: usize = 160;
pub const SHORT_ID_LEN: usize = 8;
pub const NOTE_LIMIT: usize = 20;

const ELLIPSIS: &str = "...";
const SEPARATOR: char = '|';
const REQUIRED_FIELDS: usize = 11;

const UNDER_RUBBLE_BIT: u8 = 1;
const INJURED_BIT: u8 = 2;
const ANONYMITY_BIT: u8 = 4;

pub fn pack_flags(flags: &Flags) -> u8 {
    let mut bits = 0;
    if flags.under_rubble {
        bits |= UNDER_RUBBLE_BIT;
    }
    if flags.injured {
        bits |= INJURED_BIT;
    }
    if flags.anonymity {
        bits |= ANONYMITY_BIT;
    }
    bits
}

pub fn unpack_flags(bits: u8) -> Option<Flags> {
    if bits & !(UNDER_RUBBLE_BIT | INJURED_BIT | ANONYMITY_BIT) != 0 {
        return None;
    }
    Some(Flags {
        under_rubble: bits & UNDER_RUBBLE_BIT != 0,
        injured: bits & INJURED_BIT != 0,
        anonymity: bits & ANONYMITY_BIT != 0,
    })
}

/// Notes longer than the limit keep their first characters and end in `...`,
/// for a total of exactly `NOTE_LIMIT` characters.
pub fn truncate_note(note: &str) -> String {
    if note.chars().count() <= NOTE_LIMIT {
        return note.to_string();
    }
    let keep = NOTE_LIMIT - ELLIPSIS.len();
    let mut out: String = note.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CompactRecord {
    kind: u8,
    short_id: String,
    seconds: i64,
    lat_e4: i64,
    lon_e4: i64,
    accuracy_bucket: u32,
    priority: u8,
    flags: u8,
    people: u32,
    ttl: u32,
    battery: Option<u8>,
    note: Option<String>,
}

impl CompactRecord {
    fn from_message(message: &Message) -> Result<Self, CodecError> {
        message
            .validate()
            .map_err(|e| CodecError::InvalidField(e.to_string()))?;

        let short_id: String = message.id.chars().take(SHORT_ID_LEN).collect();
        if short_id.contains(SEPARATOR) {
            return Err(CodecError::InvalidField(format!(
                "id prefix '{short_id}' contains '{SEPARATOR}'"
            )));
        }

        Ok(Self {
            kind: message.kind.tag(),
            short_id,
            seconds: message.created_at_ms.div_euclid(1000),
            lat_e4: (message.location.latitude * 10_000.0).round() as i64,
            lon_e4: (message.location.longitude * 10_000.0).round() as i64,
            accuracy_bucket: (message.location.accuracy_meters / 10.0).round() as u32,
            priority: message.priority.ordinal(),
            flags: pack_flags(&message.flags),
            people: message.people_count,
            ttl: message.ttl,
            battery: message.battery_percent,
            note: message.note.as_deref().map(truncate_note),
        })
    }

    fn to_text(&self) -> String {
        let battery = self.battery.map(|b| b.to_string()).unwrap_or_default();
        let mut text = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.kind,
            self.short_id,
            self.seconds,
            self.lat_e4,
            self.lon_e4,
            self.accuracy_bucket,
            self.priority,
            self.flags,
            self.people,
            self.ttl,
            battery,
        );
        if let Some(note) = &self.note {
            text.push(SEPARATOR);
            text.push_str(note);
        }
        text
    }

    fn parse(text: &str) -> Option<Self> {
        let fields: Vec<&str> = text.splitn(REQUIRED_FIELDS + 1, SEPARATOR).collect();
        if fields.len() < REQUIRED_FIELDS {
            return None;
        }

        let short_id = fields[1];
        if short_id.is_empty() || short_id.chars().count() > SHORT_ID_LEN {
            return None;
        }

        let battery = match fields[10] {
            "" => None,
            b => Some(b.parse().ok()?),
        };

        Some(Self {
            kind: fields[0].parse().ok()?,
            short_id: short_id.to_string(),
            seconds: fields[2].parse().ok()?,
            lat_e4: fields[3].parse().ok()?,
            lon_e4: fields[4].parse().ok()?,
            accuracy_bucket: fields[5].parse().ok()?,
            priority: fields[6].parse().ok()?,
            flags: fields[7].parse().ok()?,
            people: fields[8].parse().ok()?,
            ttl: fields[9].parse().ok()?,
            battery,
            note: fields.get(REQUIRED_FIELDS).map(|n| n.to_string()),
        })
    }

    fn into_message(self) -> Option<Message> {
        let priority = Priority::from_ordinal(self.priority)?;
        let message = Message {
            id: self.short_id,
            kind: MessageKind::from_tag(self.kind)?,
            created_at_ms: self.seconds.checked_mul(1000)?,
            location: Location {
                latitude: self.lat_e4 as f64 / 10_000.0,
                longitude: self.lon_e4 as f64 / 10_000.0,
                accuracy_meters: f64::from(self.accuracy_bucket) * 10.0,
            },
            priority,
            origin_priority: priority,
            flags: unpack_flags(self.flags)?,
            people_count: self.people,
            note: self.note,
            battery_percent: self.battery,
            ttl: self.ttl,
            hops: 0,
            signature: String::new(),
            source: Source::Peer,
            delivered: false,
        };
        message.validate().ok()?;
        Some(message)
    }
}

/// Encode for a length-limited text channel.
///
/// Fails instead of truncating when the result would exceed `CHANNEL_LIMIT`;
/// callers should shorten or drop the note and retry.
pub fn encode(message: &Message) -> Result<String, CodecError> {
    let record = CompactRecord::from_message(message)?;
    let packed = base32::encode(record.to_text().as_bytes());

    let mut payload = String::with_capacity(PREFIX.len() + packed.len());
    payload.push_str(PREFIX);
    payload.push_str(&packed);

    if payload.len() > CHANNEL_LIMIT {
        return Err(CodecError::PayloadTooLong {
            length: payload.len(),
            limit: CHANNEL_LIMIT,
        });
    }
    Ok(payload)
}

/// Inverse of `encode`. Any malformed input yields `None`.
pub fn decode(payload: &str) -> Option<Message> {
    let packed = strip_prefix(payload.trim())?;
    let bytes = base32::decode(packed)?;
    let text = String::from_utf8(bytes).ok()?;
    CompactRecord::parse(&text)?.into_message()
}

/// Quick check used to route inbound channel text before a full decode.
pub fn is_compact_payload(text: &str) -> bool {
    strip_prefix(text.trim_start()).is_some()
}

/// Gateways may change letter case, so the prefix is matched ignoring it.
fn strip_prefix(text: &str) -> Option<&str> {
    let head = text.get(..PREFIX.len())?;
    head.eq_ignore_ascii_case(PREFIX)
        .then(|| &text[PREFIX.len()..])
}
