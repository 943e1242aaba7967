//! Request pipeline: resolve format → decode → sanitize → render

use thiserror::Error;
use tracing::info;

use crate::decode::{self, DecodeError, DiagramDocument};
use crate::engine::DiagramEngine;
use crate::format::{self, UnsupportedFormat};
use crate::render::{self, RenderError, RenderResult};
use crate::sanitize::sanitize;

/// Any failure of a conversion request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Render timeout after {0}ms")]
    Timeout(u64),

    #[error("Render task failed: {0}")]
    Internal(String),
}

/// A conversion request as received on the wire
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    /// Output format token, e.g. `svg`
    pub output_format: String,
    pub source: SourceInput,
}

/// Where the diagram text comes from
#[derive(Debug, Clone)]
pub enum SourceInput {
    /// Transport-encoded token from a share link
    Encoded(String),
    /// Plain diagram text, e.g. a POST body
    Plain(String),
}

/// Convert a transport-encoded source
pub fn convert(
    engine: &dyn DiagramEngine,
    source_encoded: &str,
    output_format: &str,
) -> Result<RenderResult, ConvertError> {
    let format = format::resolve(output_format)?;
    let doc = decode::decode(source_encoded)?;
    finish(engine, doc, format)
}

/// Convert plain diagram text; skips transcoding but not normalisation or sanitizing
pub fn convert_source(
    engine: &dyn DiagramEngine,
    source: &str,
    output_format: &str,
) -> Result<RenderResult, ConvertError> {
    let format = format::resolve(output_format)?;
    let doc = DiagramDocument::from_text(source.to_string());
    finish(engine, doc, format)
}

fn finish(
    engine: &dyn DiagramEngine,
    doc: DiagramDocument,
    format: format::FileFormat,
) -> Result<RenderResult, ConvertError> {
    let doc = sanitize(doc);
    let result = render::render(engine, &doc, format)?;
    info!("Rendered {} ({} bytes)", format, result.bytes.len());
    Ok(result)
}

/// Run a conversion on the blocking pool with a timeout.
///
/// A timed-out render is not cancelled; its worker runs to completion.
#[cfg(feature = "server")]
pub async fn convert_document(
    engine: std::sync::Arc<dyn DiagramEngine>,
    request: ConvertRequest,
    timeout_ms: u64,
) -> Result<RenderResult, ConvertError> {
    use std::time::Duration;

    let task = tokio::task::spawn_blocking(move || match &request.source {
        SourceInput::Encoded(token) => convert(engine.as_ref(), token, &request.output_format),
        SourceInput::Plain(text) => convert_source(engine.as_ref(), text, &request.output_format),
    });

    match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ConvertError::Internal(join_error.to_string())),
        Err(_timeout) => Err(ConvertError::Timeout(timeout_ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::encode_plantuml;
    use crate::engine::{Diagram, DiagramBlock, EngineError, ExportMode};
    use pretty_assertions::assert_eq;
    #[cfg(feature = "server")]
    use std::sync::Arc;
    use std::sync::Mutex;

    /// Records what reached the engine and returns a tiny SVG
    #[derive(Default)]
    struct RecordingEngine {
        seen: Mutex<Vec<String>>,
    }

    impl DiagramEngine for RecordingEngine {
        fn classify(&self, block: &DiagramBlock) -> Result<Diagram, EngineError> {
            self.seen.lock().unwrap().push(block.source.clone());
            Ok(Diagram::Renderable {
                kind: "SEQUENCE".to_string(),
            })
        }

        fn export(&self, _block: &DiagramBlock, _mode: ExportMode) -> Result<Vec<u8>, EngineError> {
            Ok(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><svg/>".to_vec())
        }
    }

    struct SlowEngine;

    impl DiagramEngine for SlowEngine {
        fn classify(&self, _block: &DiagramBlock) -> Result<Diagram, EngineError> {
            std::thread::sleep(std::time::Duration::from_millis(500));
            Ok(Diagram::Renderable {
                kind: "SEQUENCE".to_string(),
            })
        }

        fn export(&self, _block: &DiagramBlock, _mode: ExportMode) -> Result<Vec<u8>, EngineError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_round_trip_to_svg() {
        let engine = RecordingEngine::default();
        let token = encode_plantuml("Bob -> Alice: hello").unwrap();

        let result = convert(&engine, &token, "svg").unwrap();
        assert!(result.bytes.starts_with(b"<?xml"));
        assert_eq!(result.content_type, "image/svg+xml");

        let seen = engine.seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            ["@startuml\nBob -> Alice: hello\n@enduml\n"]
        );
    }

    #[test]
    fn test_include_never_reaches_engine() {
        let engine = RecordingEngine::default();
        let source = "@startuml\n!include http://internal/secret\nA -> B\n@enduml";
        convert_source(&engine, source, "png").unwrap();

        let seen = engine.seen.lock().unwrap();
        assert!(!seen[0].contains("!include"));
        assert_eq!(seen[0], "@startuml\nA -> B\n@enduml\n");
    }

    #[test]
    fn test_format_checked_before_decoding() {
        let engine = RecordingEngine::default();
        let err = convert(&engine, "%zz", "pdf").unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_decode_errors_propagate() {
        let engine = RecordingEngine::default();
        assert_eq!(
            convert(&engine, "%zz", "svg"),
            Err(ConvertError::Decode(DecodeError::MalformedEncoding))
        );
        assert_eq!(
            convert(&engine, "***", "svg"),
            Err(ConvertError::Decode(DecodeError::UndecodableSource))
        );
        assert!(engine.seen.lock().unwrap().is_empty());
    }

    #[cfg(feature = "server")]
    #[tokio::test]
    async fn test_convert_document_runs_off_thread() {
        let engine: Arc<dyn DiagramEngine> = Arc::new(RecordingEngine::default());
        let request = ConvertRequest {
            output_format: "svg".to_string(),
            source: SourceInput::Plain("A -> B".to_string()),
        };
        let result = convert_document(engine, request, 5000).await.unwrap();
        assert_eq!(result.content_type, "image/svg+xml");
    }

    #[cfg(feature = "server")]
    #[tokio::test]
    async fn test_convert_document_timeout() {
        let request = ConvertRequest {
            output_format: "png".to_string(),
            source: SourceInput::Plain("A -> B".to_string()),
        };
        let err = convert_document(Arc::new(SlowEngine), request, 10)
            .await
            .unwrap_err();
        assert_eq!(err, ConvertError::Timeout(10));
    }
}
