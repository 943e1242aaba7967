//! Diagram engine abstraction
//!
//! The dispatcher only needs three capabilities from an engine: split a
//! document into blocks, tell a broken block from a renderable one, and export
//! a block to bytes. [`PlantUmlEngine`] provides them by driving the PlantUML
//! jar; tests plug in fakes.

mod plantuml;

pub use plantuml::{PlantUmlConfig, PlantUmlEngine};

use thiserror::Error;

const BLOCK_START: &str = "@start";
const BLOCK_END: &str = "@end";

/// Export modes the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportMode {
    Png,
    Svg,
    Jpeg,
    Pdf,
    Eps,
    Txt,
    Utxt,
    Latex,
}

/// One `@start...` / `@end...` section of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramBlock {
    pub source: String,
}

impl DiagramBlock {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Engine verdict on a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagram {
    /// Parsed into a diagram of the given kind (`SEQUENCE`, `CLASS`, ...)
    Renderable { kind: String },
    /// Parse or semantic error reported by the engine
    Error {
        line: Option<usize>,
        message: String,
    },
}

impl Diagram {
    pub fn is_error(&self) -> bool {
        matches!(self, Diagram::Error { .. })
    }
}

/// Engine-side failures
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Diagram engine unavailable: {0}")]
    Unavailable(String),

    #[error("Engine IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine failed: {0}")]
    Failed(String),

    #[error("Image transcoding failed: {0}")]
    Transcode(#[from] image::ImageError),
}

/// Rendering engine collaborator
pub trait DiagramEngine: Send + Sync {
    /// Split a document into diagram blocks
    fn parse(&self, source: &str) -> Result<Vec<DiagramBlock>, EngineError> {
        Ok(split_blocks(source))
    }

    /// Classify a block as renderable or erroneous
    fn classify(&self, block: &DiagramBlock) -> Result<Diagram, EngineError>;

    /// Export a block in the given mode
    fn export(&self, block: &DiagramBlock, mode: ExportMode) -> Result<Vec<u8>, EngineError>;

    /// Render the first image of a document without classifying it.
    ///
    /// Broken diagrams come back as whatever placeholder the engine draws.
    fn output_image(&self, source: &str, mode: ExportMode) -> Result<Vec<u8>, EngineError> {
        let block = self
            .parse(source)?
            .into_iter()
            .next()
            .unwrap_or_else(|| DiagramBlock::new(source));
        self.export(&block, mode)
    }
}

/// Collect complete `@start` ... `@end` blocks; text outside blocks and an
/// unterminated trailing block are ignored.
pub fn split_blocks(source: &str) -> Vec<DiagramBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<String> = None;

    for line in source.lines() {
        let trimmed = line.trim_start();
        if let Some(buf) = current.as_mut() {
            buf.push_str(line);
            buf.push('\n');
            if trimmed.starts_with(BLOCK_END) {
                if let Some(block) = current.take() {
                    blocks.push(DiagramBlock::new(block));
                }
            }
        } else if trimmed.starts_with(BLOCK_START) {
            current = Some(format!("{}\n", line));
        }
    }

    blocks
}
