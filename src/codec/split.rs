//! Splitting free text across several channel-sized parts.
//!
//! Each part starts with `"(i/n) "`. The part count is found by iterating until
//! the prefix width (which depends on the digits of `n`) stops changing.
//! Lengths are counted in characters.

use crate::codec::compact::CHANNEL_LIMIT;

pub fn split_long_message(text: &str) -> Vec<String> {
    split_with_limit(text, CHANNEL_LIMIT)
}

pub fn split_with_limit(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return vec![text.to_string()];
    }

    let mut total = 1;
    let chunk = loop {
        let room = limit.saturating_sub(prefix(total, total).chars().count());
        if room == 0 {
            // limit too small to carry any content next to a prefix
            return vec![text.to_string()];
        }
        let needed = chars.len().div_ceil(room);
        if needed <= total {
            break room;
        }
        total = needed;
    };

    let parts = chars.len().div_ceil(chunk);
    chars
        .chunks(chunk)
        .enumerate()
        .map(|(i, piece)| {
            let mut part = prefix(i + 1, parts);
            part.extend(piece.iter());
            part
        })
        .collect()
}

fn prefix(index: usize, total: usize) -> String {
    format!("({index}/{total}) ")
}
