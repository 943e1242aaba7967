//! Render dispatch
//!
//! Two paths:
//! - `base64`: render PNG without classification, wrap as a data URI
//! - everything else: classify the first block, fail on engine errors,
//!   export in the requested mode
//!
//! Only the first block of a multi-diagram document is ever rendered.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;
use tracing::{debug, warn};

use crate::decode::DiagramDocument;
use crate::engine::{Diagram, DiagramEngine, EngineError, ExportMode};
use crate::format::FileFormat;

/// Prefix of the base64 data-URI payload
pub const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Rendered bytes plus the content type to serve them with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Render failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Bad request: {0}")]
    BadDiagram(String),

    #[error("Bad request")]
    EngineIo(String),

    #[error("Diagram engine unavailable")]
    EngineUnavailable(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(FileFormat),
}

impl From<EngineError> for RenderError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(msg) => RenderError::EngineUnavailable(msg),
            other => RenderError::EngineIo(other.to_string()),
        }
    }
}

/// Render a sanitized document in a supported format
pub fn render(
    engine: &dyn DiagramEngine,
    doc: &DiagramDocument,
    format: FileFormat,
) -> Result<RenderResult, RenderError> {
    if !format.is_supported() {
        return Err(RenderError::UnsupportedFormat(format));
    }

    let bytes = match format {
        FileFormat::Base64 => render_data_uri(engine, doc)?,
        _ => render_direct(engine, doc, format.export_mode())?,
    };

    Ok(RenderResult {
        bytes,
        content_type: format.content_type(),
    })
}

/// Error placeholder images are encoded like any other image
fn render_data_uri(
    engine: &dyn DiagramEngine,
    doc: &DiagramDocument,
) -> Result<Vec<u8>, RenderError> {
    let png = engine.output_image(doc.as_str(), ExportMode::Png)?;
    let mut payload = String::with_capacity(DATA_URI_PREFIX.len() + png.len() * 4 / 3 + 4);
    payload.push_str(DATA_URI_PREFIX);
    STANDARD.encode_string(&png, &mut payload);
    Ok(payload.into_bytes())
}

fn render_direct(
    engine: &dyn DiagramEngine,
    doc: &DiagramDocument,
    mode: ExportMode,
) -> Result<Vec<u8>, RenderError> {
    let blocks = engine.parse(doc.as_str())?;
    if blocks.len() > 1 {
        debug!("Document has {} blocks, rendering the first", blocks.len());
    }
    let block = blocks
        .first()
        .ok_or_else(|| RenderError::BadDiagram("no diagram found".to_string()))?;

    match engine.classify(block)? {
        Diagram::Error { line, message } => {
            warn!("Diagram rejected by engine at line {:?}: {}", line, message);
            Err(RenderError::BadDiagram(message))
        }
        Diagram::Renderable { kind } => {
            debug!("Exporting {} diagram as {:?}", kind, mode);
            Ok(engine.export(block, mode)?)
        }
    }
}
