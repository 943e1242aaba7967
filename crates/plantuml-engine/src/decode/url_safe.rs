//! URL-safe base64 encodings
//!
//! [`Base64Text`] carries the UTF-8 text as-is. [`DeflateBase64Url`] is the
//! zlib-compressed form used by newer diagram-sharing links.

use std::io::{Read, Write};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::{SourceDecoder, TranscodeError, MAX_DECODED_LEN};

/// URL-safe alphabet, padding optional on input
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Base64url of the UTF-8 source, no compression
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Text;

impl SourceDecoder for Base64Text {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn decode(&self, token: &str) -> Result<String, TranscodeError> {
        let bytes = URL_SAFE_LENIENT.decode(token)?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// Base64url of the zlib-compressed source
#[derive(Debug, Clone, Copy, Default)]
pub struct DeflateBase64Url;

impl SourceDecoder for DeflateBase64Url {
    fn name(&self) -> &'static str {
        "deflate-base64url"
    }

    fn decode(&self, token: &str) -> Result<String, TranscodeError> {
        let compressed = URL_SAFE_LENIENT.decode(token)?;
        let mut inflated = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .take(MAX_DECODED_LEN + 1)
            .read_to_end(&mut inflated)?;
        if inflated.len() as u64 > MAX_DECODED_LEN {
            return Err(TranscodeError::TooLarge(MAX_DECODED_LEN));
        }
        Ok(String::from_utf8(inflated)?)
    }
}

/// Encode text as padded base64url
pub fn encode_base64(text: &str) -> String {
    URL_SAFE.encode(text.as_bytes())
}

/// Encode text as zlib + padded base64url
pub fn encode_deflate(text: &str) -> std::io::Result<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(text.as_bytes())?;
    Ok(URL_SAFE.encode(encoder.finish()?))
}
