use super::compact::{self, CHANNEL_LIMIT, NOTE_LIMIT, PREFIX, pack_flags, unpack_flags};
use super::split::{split_long_message, split_with_limit};
use super::{base32, decode, encode, is_compact_payload};
use crate::message::{Flags, Location, Message, MessageKind, Priority, Source};
use crate::utils::error::CodecError;

fn codec_message() -> Message {
    Message {
        id: "abcd1234".to_string(),
        kind: MessageKind::HelpRequest,
        created_at_ms: 1_725_000_000_000,
        location: Location {
            latitude: 41.0082,
            longitude: 28.9784,
            accuracy_meters: 30.0,
        },
        priority: Priority::Critical,
        origin_priority: Priority::Critical,
        flags: Flags {
            under_rubble: true,
            injured: true,
            anonymity: false,
        },
        people_count: 3,
        note: Some("2nd floor, east".to_string()),
        battery_percent: Some(55),
        ttl: 8,
        hops: 0,
        signature: String::new(),
        source: Source::Peer,
        delivered: false,
    }
}

#[test]
fn test_base32_known_vectors() {
    assert_eq!(base32::encode(b""), "");
    assert_eq!(base32::encode(b"f"), "MY");
    assert_eq!(base32::encode(b"fo"), "MZXQ");
    assert_eq!(base32::encode(b"foo"), "MZXW6");
    assert_eq!(base32::encode(b"foobar"), "MZXW6YTBOI");

    assert_eq!(base32::decode("MZXW6YTBOI").unwrap(), b"foobar");
    assert_eq!(base32::decode("mzxw6ytboi").unwrap(), b"foobar");
}

#[test]
fn test_base32_rejects_foreign_symbols_and_bad_lengths() {
    assert!(base32::decode("MZXW1").is_none());
    assert!(base32::decode("MZ=Q").is_none());
    // one symbol alone cannot hold a byte
    assert!(base32::decode("M").is_none());
    // "MY" is 'f' followed by two zero bits; "M3" sets those bits
    assert_eq!(base32::decode("MY").unwrap(), b"f");
    assert!(base32::decode("M3").is_none());
}

#[test]
fn test_flag_bits() {
    let all = Flags {
        under_rubble: true,
        injured: true,
        anonymity: true,
    };
    assert_eq!(pack_flags(&all), 7);
    assert_eq!(
        pack_flags(&Flags {
            injured: true,
            ..Default::default()
        }),
        2
    );
    assert!(unpack_flags(1).unwrap().under_rubble);
    assert!(unpack_flags(4).unwrap().anonymity);
    assert!(unpack_flags(8).is_none());
}

#[test]
fn test_round_trip_reproduces_every_field() {
    let msg = codec_message();
    let payload = encode(&msg).unwrap();

    assert!(payload.starts_with(PREFIX));
    assert!(payload.len() <= CHANNEL_LIMIT);
    assert!(
        payload[PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c))
    );

    let decoded = decode(&payload).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn test_round_trip_keeps_absent_optionals_absent() {
    let mut msg = codec_message();
    msg.note = None;
    msg.battery_percent = None;
    msg.kind = MessageKind::StatusPing;
    msg.location.latitude = -33.8688;
    msg.location.longitude = -151.2093;

    let decoded = decode(&encode(&msg).unwrap()).unwrap();
    assert_eq!(decoded.note, None);
    assert_eq!(decoded.battery_percent, None);
    assert_eq!(decoded, msg);
}

#[test]
fn test_round_trip_note_with_separator_and_empty_note() {
    let mut msg = codec_message();
    msg.note = Some("a|b|c".to_string());
    assert_eq!(decode(&encode(&msg).unwrap()).unwrap().note.as_deref(), Some("a|b|c"));

    msg.note = Some(String::new());
    assert_eq!(decode(&encode(&msg).unwrap()).unwrap().note.as_deref(), Some(""));
}

#[test]
fn test_quantization() {
    let mut msg = codec_message();
    msg.id = "0123456789abcdef".to_string();
    msg.created_at_ms = 1_725_000_000_999;
    msg.location.latitude = 41.008_249;
    msg.location.accuracy_meters = 14.0;
    msg.hops = 4;
    msg.signature = "sig".to_string();

    let decoded = decode(&encode(&msg).unwrap()).unwrap();
    assert_eq!(decoded.id, "01234567");
    assert_eq!(decoded.created_at_ms, 1_725_000_000_000);
    assert_eq!(decoded.location.latitude, 41.0082);
    assert_eq!(decoded.location.accuracy_meters, 10.0);
    // not carried by the compact form
    assert_eq!(decoded.hops, 0);
    assert!(decoded.signature.is_empty());
}

#[test]
fn test_long_note_is_truncated_with_ellipsis() {
    let mut msg = codec_message();
    msg.note = Some("trapped near the old bakery on main street".to_string());

    let note = decode(&encode(&msg).unwrap()).unwrap().note.unwrap();
    assert_eq!(note.chars().count(), NOTE_LIMIT);
    assert_eq!(note, "trapped near the ...");
    assert_eq!(compact::truncate_note("short"), "short");
}

#[test]
fn test_encode_fails_past_channel_limit_and_succeeds_once_shortened() {
    let mut msg = codec_message();
    msg.note = Some("🚑".repeat(NOTE_LIMIT));

    match encode(&msg) {
        Err(CodecError::PayloadTooLong { length, limit }) => {
            assert!(length > CHANNEL_LIMIT);
            assert_eq!(limit, CHANNEL_LIMIT);
        }
        other => panic!("expected overflow, got {other:?}"),
    }

    msg.note = Some("🚑".repeat(12));
    assert!(encode(&msg).is_err());

    let mut emojis = 12;
    let payload = loop {
        msg.note = Some("🚑".repeat(emojis));
        match encode(&msg) {
            Ok(p) => break p,
            Err(_) => emojis -= 1,
        }
    };
    assert_eq!(emojis, 11);
    assert!(payload.len() <= CHANNEL_LIMIT);
    assert_eq!(decode(&payload).unwrap().note, msg.note);
}

#[test]
fn test_encode_rejects_invalid_messages() {
    let mut msg = codec_message();
    msg.location.latitude = 95.0;
    assert!(matches!(encode(&msg), Err(CodecError::InvalidField(_))));

    let mut msg = codec_message();
    msg.id = "ab|cd".to_string();
    assert!(matches!(encode(&msg), Err(CodecError::InvalidField(_))));
}

#[test]
fn test_decode_malformed_input_returns_none() {
    let payload = encode(&codec_message()).unwrap();

    assert!(decode("").is_none());
    assert!(decode("hello, are you safe?").is_none());
    assert!(decode(&payload.replacen(PREFIX, "XOS1:", 1)).is_none());
    assert!(decode(&format!("{payload}1")).is_none());

    // cut the symbol stream at a length no byte sequence can produce
    let body = &payload[PREFIX.len()..];
    let cut = (1..body.len())
        .rev()
        .find(|n| matches!(n % 8, 1 | 3 | 6))
        .unwrap();
    assert!(decode(&format!("{PREFIX}{}", &body[..cut])).is_none());

    assert!(decode(&format!("{PREFIX}{}", base32::encode(b"0|id|1|2|3"))).is_none());
    assert!(decode(&format!("{PREFIX}{}", base32::encode(&[0xff, 0xfe, 0xfd]))).is_none());
}

#[test]
fn test_decode_rejects_structurally_invalid_records() {
    let bad = [
        "9|abcd1234|1725000000|410082|289784|3|2|3|3|8|55",
        "0|abcd1234|1725000000|910082|289784|3|2|3|3|8|55",
        "0|abcd1234|1725000000|410082|289784|3|3|3|3|8|55",
        "0|abcd1234|1725000000|410082|289784|3|2|8|3|8|55",
        "0|abcd1234|1725000000|410082|289784|3|2|3|0|8|55",
        "0|abcd1234|1725000000|410082|289784|3|2|3|3|8|101",
        "0||1725000000|410082|289784|3|2|3|3|8|55",
        "0|abcd1234|x|410082|289784|3|2|3|3|8|55",
    ];
    for record in bad {
        let payload = format!("{PREFIX}{}", base32::encode(record.as_bytes()));
        assert!(decode(&payload).is_none(), "accepted {record}");
    }

    let good = "0|abcd1234|1725000000|410082|289784|3|2|3|3|8|55";
    let payload = format!("{PREFIX}{}", base32::encode(good.as_bytes()));
    assert!(decode(&payload).is_some());
}

#[test]
fn test_decode_tolerates_surrounding_whitespace_and_lowercase() {
    let payload = encode(&codec_message()).unwrap();
    let body = payload[PREFIX.len()..].to_lowercase();
    let relaxed = format!("  {PREFIX}{body}\n");
    assert_eq!(decode(&relaxed).unwrap(), codec_message());

    let all_lower = format!("  {}\n", payload.to_lowercase());
    assert!(all_lower.trim_start().starts_with("sos1:"));
    assert_eq!(decode(&all_lower).unwrap(), codec_message());
}

#[test]
fn test_is_compact_payload() {
    let payload = encode(&codec_message()).unwrap();
    assert!(is_compact_payload(&payload));
    assert!(is_compact_payload(&format!("  {payload}")));
    assert!(is_compact_payload(&payload.to_lowercase()));
    assert!(!is_compact_payload("SOS please help"));
    assert!(!is_compact_payload(""));
}

#[test]
fn test_split_short_text_is_unchanged() {
    let text = "x".repeat(CHANNEL_LIMIT);
    assert_eq!(split_long_message(&text), vec![text.clone()]);
    assert_eq!(split_long_message(""), vec![String::new()]);
}

#[test]
fn test_split_two_hundred_characters() {
    let text = "a".repeat(200);
    let parts = split_long_message(&text);

    assert_eq!(parts.len(), 2);
    assert!(parts[0].starts_with("(1/"));
    assert!(parts[1].starts_with("(2/"));
    assert!(parts.iter().all(|p| p.chars().count() <= CHANNEL_LIMIT));

    let rebuilt: String = parts
        .iter()
        .map(|p| p.split_once(") ").unwrap().1)
        .collect();
    assert_eq!(rebuilt, text);
}

#[test]
fn test_split_keeps_order_across_many_parts() {
    let text: String = (0..2_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    let parts = split_long_message(&text);

    assert!(parts.len() >= 10);
    let total = parts.len();
    for (i, part) in parts.iter().enumerate() {
        assert!(part.starts_with(&format!("({}/{total}) ", i + 1)));
        assert!(part.chars().count() <= CHANNEL_LIMIT);
    }
    let rebuilt: String = parts
        .iter()
        .map(|p| p.split_once(") ").unwrap().1)
        .collect();
    assert_eq!(rebuilt, text);
}

#[test]
fn test_split_counts_characters_not_bytes() {
    let text = "ş".repeat(100);
    assert_eq!(split_with_limit(&text, 100), vec![text.clone()]);
    assert_eq!(split_with_limit(&text, 60).len(), 2);
}
