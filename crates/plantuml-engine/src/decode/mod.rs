//! Diagram source decoding
//!
//! Turns the `source_encoded` path segment into a [`DiagramDocument`]:
//!
//! 1. percent-decode (form rules, strict about malformed escapes)
//! 2. run the [`DecoderChain`], first successful strategy wins
//! 3. wrap the text in `@startuml` / `@enduml` unless it already starts a block
//!
//! Two generations of share links exist in the wild, so the caller never has
//! to say which encoding a token uses.

mod plantuml;
mod url_safe;

pub use plantuml::{encode_plantuml, PlantUmlTranscoder};
pub use url_safe::{encode_base64, encode_deflate, Base64Text, DeflateBase64Url};

use std::borrow::Cow;

use lazy_static::lazy_static;
use thiserror::Error;
use tracing::debug;

/// Opening marker prefix recognised by the engine (`@startuml`, `@startmindmap`, ...)
pub const START_MARKER_PREFIX: &str = "@start";
/// Marker line prepended to bare diagram text
pub const START_MARKER: &str = "@startuml";
/// Marker line appended to bare diagram text
pub const END_MARKER: &str = "@enduml";

/// Upper bound on inflated source size
pub(crate) const MAX_DECODED_LEN: u64 = 4 * 1024 * 1024;

lazy_static! {
    static ref DEFAULT_CHAIN: DecoderChain = DecoderChain::default();
}

/// Errors surfaced by [`decode`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed transport encoding")]
    MalformedEncoding,

    #[error("unable to decode the diagram source")]
    UndecodableSource,
}

/// Failure of a single decode strategy. Never leaves the chain.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("invalid character {0:?} in encoded source")]
    InvalidCharacter(char),

    #[error("invalid hex payload: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("inflate failed: {0}")]
    Inflate(#[from] std::io::Error),

    #[error("decoded source exceeds {0} bytes")]
    TooLarge(u64),

    #[error("decoded source is not UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// One reversible text-transcoding scheme
pub trait SourceDecoder: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Reconstruct diagram text from a token.
    ///
    /// Empty output is a success; only `Err` moves the chain on.
    fn decode(&self, token: &str) -> Result<String, TranscodeError>;
}

/// Ordered list of decode strategies
pub struct DecoderChain {
    strategies: Vec<Box<dyn SourceDecoder>>,
}

impl Default for DecoderChain {
    /// PlantUML transcoder first, then plain base64, then deflate + base64url
    fn default() -> Self {
        Self::empty()
            .push(PlantUmlTranscoder)
            .push(Base64Text)
            .push(DeflateBase64Url)
    }
}

impl DecoderChain {
    /// A chain with no strategies; decoding always fails
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy, tried after every strategy already present
    pub fn push(mut self, strategy: impl SourceDecoder + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Names of the strategies in the order they are tried
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each strategy in order and return the first success
    pub fn transcode(&self, token: &str) -> Result<String, DecodeError> {
        for strategy in &self.strategies {
            match strategy.decode(token) {
                Ok(text) => {
                    debug!("Decoded source with {}", strategy.name());
                    return Ok(text);
                }
                Err(e) => debug!("Decoder {} rejected source: {}", strategy.name(), e),
            }
        }
        Err(DecodeError::UndecodableSource)
    }

    /// Percent-decode, transcode and normalise a transport-encoded source
    pub fn decode(&self, encoded: &str) -> Result<DiagramDocument, DecodeError> {
        let text = percent_decode(encoded)?;
        let text = self.transcode(&text)?;
        Ok(DiagramDocument::from_text(text))
    }
}

/// Decode a transport-encoded source with the default strategy chain
pub fn decode(encoded: &str) -> Result<DiagramDocument, DecodeError> {
    DEFAULT_CHAIN.decode(encoded)
}

/// Form-style percent decoding: `+` is a space, every `%` must start a valid escape
fn percent_decode(input: &str) -> Result<String, DecodeError> {
    let bytes = input.as_bytes();
    let malformed = input.match_indices('%').any(|(at, _)| {
        bytes
            .get(at + 1..at + 3)
            .map_or(true, |escape| !escape.iter().all(u8::is_ascii_hexdigit))
    });
    if malformed {
        return Err(DecodeError::MalformedEncoding);
    }

    let spaced = input.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .map_err(|_| DecodeError::MalformedEncoding)
}

/// Diagram source that starts with a start marker and ends with an end marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramDocument(String);

impl DiagramDocument {
    /// Accept text that already opens a block, otherwise wrap it in `@startuml`/`@enduml`
    pub fn from_text(text: String) -> Self {
        if text.starts_with(START_MARKER_PREFIX) {
            return Self(text);
        }

        // Exactly one newline between the body and the end marker
        let body = text.trim_end_matches('\n');
        let mut source = String::with_capacity(body.len() + 20);
        source.push_str(START_MARKER);
        source.push('\n');
        source.push_str(body);
        source.push('\n');
        source.push_str(END_MARKER);
        Self(source)
    }

    /// Wrap text that has already been through [`from_text`](Self::from_text)
    pub(crate) fn from_normalized(source: String) -> Self {
        Self(source)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for DiagramDocument {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_plantuml_token_wraps_bare_text() {
        let token = encode_plantuml("Bob -> Alice: hello").unwrap();
        let doc = decode(&token).unwrap();
        assert_eq!(doc.as_str(), "@startuml\nBob -> Alice: hello\n@enduml");
    }

    #[test]
    fn test_decode_keeps_marked_source_verbatim() {
        let source = "@startuml\nBob -> Alice\n@enduml\n";
        let token = encode_plantuml(source).unwrap();
        assert_eq!(decode(&token).unwrap().as_str(), source);
    }

    #[test]
    fn test_decode_keeps_other_diagram_kinds() {
        let source = "@startmindmap\n* root\n@endmindmap";
        let token = encode_plantuml(source).unwrap();
        assert_eq!(decode(&token).unwrap().as_str(), source);
    }

    #[test]
    fn test_falls_back_to_base64_text() {
        let token = encode_base64("Bob -> Alice: hello");
        assert!(token.ends_with('='));
        let doc = decode(&token).unwrap();
        assert_eq!(doc.as_str(), "@startuml\nBob -> Alice: hello\n@enduml");
    }

    #[test]
    fn test_falls_back_to_deflate_base64url() {
        let token = encode_deflate("A -> B").unwrap();
        let doc = decode(&token).unwrap();
        assert_eq!(doc.as_str(), "@startuml\nA -> B\n@enduml");
    }

    #[test]
    fn test_percent_escapes_are_decoded_first() {
        let token = encode_base64("A -> B1");
        assert!(token.ends_with("=="));
        let escaped = token.replace('=', "%3D");
        assert_eq!(
            decode(&escaped).unwrap().as_str(),
            "@startuml\nA -> B1\n@enduml"
        );
    }

    #[test]
    fn test_malformed_percent_escape() {
        assert_eq!(decode("abc%zz"), Err(DecodeError::MalformedEncoding));
        assert_eq!(decode("abc%4"), Err(DecodeError::MalformedEncoding));
        assert_eq!(decode("%"), Err(DecodeError::MalformedEncoding));
    }

    #[test]
    fn test_percent_escape_with_invalid_utf8() {
        assert_eq!(decode("%C3%28"), Err(DecodeError::MalformedEncoding));
    }

    #[test]
    fn test_plus_is_space() {
        assert_eq!(percent_decode("a+b%2Bc").unwrap(), "a b+c");
    }

    #[test]
    fn test_undecodable_source() {
        assert_eq!(
            decode("!!!not*encoded!!!"),
            Err(DecodeError::UndecodableSource)
        );
    }

    #[test]
    fn test_empty_chain_never_decodes() {
        let chain = DecoderChain::empty();
        assert_eq!(
            chain.decode("SyfFKj2rKt3CoKnELR1Io4ZDoSa70000"),
            Err(DecodeError::UndecodableSource)
        );
    }

    #[test]
    fn test_chain_order() {
        assert_eq!(
            DecoderChain::default().names(),
            vec!["plantuml", "base64", "deflate-base64url"]
        );
    }

    #[test]
    fn test_appended_strategy_is_tried_last() {
        struct Literal;
        impl SourceDecoder for Literal {
            fn name(&self) -> &'static str {
                "literal"
            }
            fn decode(&self, token: &str) -> Result<String, TranscodeError> {
                Ok(token.to_string())
            }
        }

        let chain = DecoderChain::default().push(Literal);
        let doc = chain.decode("!!!").unwrap();
        assert_eq!(doc.as_str(), "@startuml\n!!!\n@enduml");
    }

    #[test]
    fn test_from_text_single_trailing_newline() {
        let doc = DiagramDocument::from_text("A -> B\n".to_string());
        assert_eq!(doc.as_str(), "@startuml\nA -> B\n@enduml");
    }

    #[test]
    fn test_from_text_collapses_trailing_newlines() {
        let doc = DiagramDocument::from_text("A -> B\n\n\n".to_string());
        assert_eq!(doc.as_str(), "@startuml\nA -> B\n@enduml");
    }

    #[test]
    fn test_from_text_empty() {
        let doc = DiagramDocument::from_text(String::new());
        assert_eq!(doc.as_str(), "@startuml\n\n@enduml");
    }
}
