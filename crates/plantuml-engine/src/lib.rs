//! PlantUML rendering pipeline
//!
//! Turns a diagram share token into image bytes:
//! - Format resolution against the formats the endpoint serves
//! - Multi-strategy source decoding with fallback
//! - Include-directive sanitizing
//! - Render dispatch through a pluggable [`DiagramEngine`](engine::DiagramEngine)
//!
//! # Feature Flags
//!
//! - `server` (default): Enables async `convert_document` with timeout (requires tokio)

pub mod decode;
pub mod engine;
pub mod format;
pub mod pipeline;
pub mod render;
pub mod sanitize;

pub use decode::{decode, DecodeError, DiagramDocument};
pub use engine::{DiagramEngine, PlantUmlConfig, PlantUmlEngine};
pub use format::{resolve, FileFormat, UnsupportedFormat, SUPPORTED_FORMATS};
pub use pipeline::{convert, convert_source, ConvertError, ConvertRequest, SourceInput};
pub use render::{render, RenderError, RenderResult};
pub use sanitize::sanitize;

#[cfg(feature = "server")]
pub use pipeline::convert_document;
