//! PlantUML text encoding
//!
//! Raw deflate followed by a 64-character alphabet (`0-9A-Za-z-_`), four
//! characters per three bytes. A `~h` prefix marks the uncompressed hex form.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use super::{SourceDecoder, TranscodeError, MAX_DECODED_LEN};

const HEX_PREFIX: &str = "~h";

/// Decoder for tokens produced by PlantUML's own encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct PlantUmlTranscoder;

impl SourceDecoder for PlantUmlTranscoder {
    fn name(&self) -> &'static str {
        "plantuml"
    }

    fn decode(&self, token: &str) -> Result<String, TranscodeError> {
        if let Some(hex_payload) = token.strip_prefix(HEX_PREFIX) {
            return Ok(String::from_utf8(hex::decode(hex_payload)?)?);
        }
        if token.is_empty() {
            return Ok(String::new());
        }

        let compressed = decode_alphabet(token)?;
        let mut inflated = Vec::new();
        DeflateDecoder::new(compressed.as_slice())
            .take(MAX_DECODED_LEN + 1)
            .read_to_end(&mut inflated)?;
        if inflated.len() as u64 > MAX_DECODED_LEN {
            return Err(TranscodeError::TooLarge(MAX_DECODED_LEN));
        }

        Ok(String::from_utf8(inflated)?)
    }
}

/// Encode diagram text the way PlantUML share links do
pub fn encode_plantuml(text: &str) -> std::io::Result<String> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(text.as_bytes())?;
    Ok(encode_alphabet(&encoder.finish()?))
}

fn encode_6bit(value: u8) -> char {
    let c = match value {
        0..=9 => b'0' + value,
        10..=35 => b'A' + (value - 10),
        36..=61 => b'a' + (value - 36),
        62 => b'-',
        _ => b'_',
    };
    c as char
}

fn decode_6bit(c: char) -> Result<u8, TranscodeError> {
    let value = match c {
        '0'..='9' => c as u8 - b'0',
        'A'..='Z' => c as u8 - b'A' + 10,
        'a'..='z' => c as u8 - b'a' + 36,
        '-' => 62,
        '_' => 63,
        other => return Err(TranscodeError::InvalidCharacter(other)),
    };
    Ok(value)
}

fn encode_alphabet(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(3) {
        let b1 = chunk[0];
        let b2 = chunk.get(1).copied().unwrap_or(0);
        let b3 = chunk.get(2).copied().unwrap_or(0);
        out.push(encode_6bit(b1 >> 2));
        out.push(encode_6bit(((b1 & 0x3) << 4) | (b2 >> 4)));
        out.push(encode_6bit(((b2 & 0xF) << 2) | (b3 >> 6)));
        out.push(encode_6bit(b3 & 0x3F));
    }
    out
}

/// Missing characters in a short final group decode as zero
fn decode_alphabet(token: &str) -> Result<Vec<u8>, TranscodeError> {
    let values = token
        .chars()
        .map(decode_6bit)
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(values.len() * 3 / 4 + 3);
    for group in values.chunks(4) {
        let c1 = group[0];
        let c2 = group.get(1).copied().unwrap_or(0);
        let c3 = group.get(2).copied().unwrap_or(0);
        let c4 = group.get(3).copied().unwrap_or(0);
        out.push((c1 << 2) | (c2 >> 4));
        out.push(((c2 & 0xF) << 4) | (c3 >> 2));
        out.push(((c3 & 0x3) << 6) | c4);
    }
    Ok(out)
}
