//! Five-bits-per-symbol packing over the `A-Z2-7` alphabet, without padding.
//!
//! Decoding accepts either case and rejects anything that could not have been
//! produced by `encode`: foreign symbols, impossible lengths, and non-zero
//! trailing bits.

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = (buffer >> bits) & 0x1f;
            out.push(char::from(ALPHABET[index as usize]));
        }
        buffer &= (1 << bits) - 1;
    }

    if bits > 0 {
        let index = (buffer << (5 - bits)) & 0x1f;
        out.push(char::from(ALPHABET[index as usize]));
    }

    out
}

pub fn decode(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for symbol in text.bytes() {
        let value = symbol_value(symbol)?;
        buffer = (buffer << 5) | u32::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
        buffer &= (1 << bits) - 1;
    }

    // a whole leftover symbol, or set padding bits, means the text was not ours
    if bits >= 5 || buffer != 0 {
        return None;
    }

    Some(out)
}

fn symbol_value(symbol: u8) -> Option<u8> {
    match symbol {
        b'A'..=b'Z' => Some(symbol - b'A'),
        b'a'..=b'z' => Some(symbol - b'a'),
        b'2'..=b'7' => Some(symbol - b'2' + 26),
        _ => None,
    }
}
