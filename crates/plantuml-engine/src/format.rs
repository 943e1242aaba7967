//! Output format handling (PNG, SVG, JPEG, base64 data URI)

use lazy_static::lazy_static;
use serde::Serialize;
use thiserror::Error;

use crate::engine::ExportMode;

/// Formats this endpoint serves, in the order they are reported to clients
pub const SUPPORTED_FORMATS: [FileFormat; 4] = [
    FileFormat::Png,
    FileFormat::Svg,
    FileFormat::Jpeg,
    FileFormat::Base64,
];

lazy_static! {
    static ref SUPPORTED_FORMAT_LIST: String = SUPPORTED_FORMATS
        .iter()
        .map(|f| f.token())
        .collect::<Vec<_>>()
        .join(", ");
}

/// Every format token the registry recognises.
///
/// The engine can produce more formats than the endpoint serves; only the
/// members of [`SUPPORTED_FORMATS`] survive [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Png,
    Svg,
    Jpeg,
    Base64,
    Pdf,
    Eps,
    Txt,
    Utxt,
    Latex,
}

impl FileFormat {
    /// Look up a format by its exact (case-sensitive) token
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "png" => Some(FileFormat::Png),
            "svg" => Some(FileFormat::Svg),
            "jpeg" => Some(FileFormat::Jpeg),
            "base64" => Some(FileFormat::Base64),
            "pdf" => Some(FileFormat::Pdf),
            "eps" => Some(FileFormat::Eps),
            "txt" => Some(FileFormat::Txt),
            "utxt" => Some(FileFormat::Utxt),
            "latex" => Some(FileFormat::Latex),
            _ => None,
        }
    }

    /// The token used in request paths
    pub fn token(&self) -> &'static str {
        match self {
            FileFormat::Png => "png",
            FileFormat::Svg => "svg",
            FileFormat::Jpeg => "jpeg",
            FileFormat::Base64 => "base64",
            FileFormat::Pdf => "pdf",
            FileFormat::Eps => "eps",
            FileFormat::Txt => "txt",
            FileFormat::Utxt => "utxt",
            FileFormat::Latex => "latex",
        }
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_FORMATS.contains(self)
    }

    /// Get the response Content-Type for this format
    pub fn content_type(&self) -> &'static str {
        match self {
            FileFormat::Png => "image/png",
            FileFormat::Svg => "image/svg+xml",
            FileFormat::Jpeg => "image/jpeg",
            // The payload is a data-URI string, not a binary image
            FileFormat::Base64 => "text/plain",
            FileFormat::Pdf => "application/pdf",
            FileFormat::Eps => "application/postscript",
            FileFormat::Txt | FileFormat::Utxt => "text/plain",
            FileFormat::Latex => "application/x-latex",
        }
    }

    /// Get the engine export mode used to produce this format
    pub fn export_mode(&self) -> ExportMode {
        match self {
            FileFormat::Png | FileFormat::Base64 => ExportMode::Png,
            FileFormat::Svg => ExportMode::Svg,
            FileFormat::Jpeg => ExportMode::Jpeg,
            FileFormat::Pdf => ExportMode::Pdf,
            FileFormat::Eps => ExportMode::Eps,
            FileFormat::Txt => ExportMode::Txt,
            FileFormat::Utxt => ExportMode::Utxt,
            FileFormat::Latex => ExportMode::Latex,
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Requested format is unknown or not served by this endpoint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported output format: {token}. Must be one of {supported}.")]
pub struct UnsupportedFormat {
    /// The token exactly as the client sent it
    pub token: String,
    /// Comma-joined supported tokens, see [`supported_format_list`]
    pub supported: &'static str,
}

/// Resolve a request token to a supported format
pub fn resolve(token: &str) -> Result<FileFormat, UnsupportedFormat> {
    match FileFormat::from_token(token) {
        Some(format) if format.is_supported() => Ok(format),
        _ => Err(UnsupportedFormat {
            token: token.to_string(),
            supported: supported_format_list(),
        }),
    }
}

/// Human-readable list of supported tokens: `png, svg, jpeg, base64`
pub fn supported_format_list() -> &'static str {
    SUPPORTED_FORMAT_LIST.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_supported_tokens() {
        assert_eq!(resolve("png"), Ok(FileFormat::Png));
        assert_eq!(resolve("svg"), Ok(FileFormat::Svg));
        assert_eq!(resolve("jpeg"), Ok(FileFormat::Jpeg));
        assert_eq!(resolve("base64"), Ok(FileFormat::Base64));
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        assert!(resolve("PNG").is_err());
        assert!(resolve("Svg").is_err());
    }

    #[test]
    fn test_recognised_but_unsupported_format() {
        assert_eq!(FileFormat::from_token("pdf"), Some(FileFormat::Pdf));

        let err = resolve("pdf").unwrap_err();
        assert_eq!(err.token, "pdf");
        assert_eq!(err.supported, "png, svg, jpeg, base64");
        assert_eq!(
            err.to_string(),
            "Unsupported output format: pdf. Must be one of png, svg, jpeg, base64."
        );
    }

    #[test]
    fn test_content_types() {
        assert_eq!(FileFormat::Png.content_type(), "image/png");
        assert_eq!(FileFormat::Svg.content_type(), "image/svg+xml");
        assert_eq!(FileFormat::Jpeg.content_type(), "image/jpeg");
        assert_eq!(FileFormat::Base64.content_type(), "text/plain");
    }

    #[test]
    fn test_base64_exports_as_png() {
        assert_eq!(FileFormat::Base64.export_mode(), ExportMode::Png);
    }

    #[test]
    fn test_serializes_as_token() {
        let json = serde_json::to_string(&SUPPORTED_FORMATS).unwrap();
        assert_eq!(json, r#"["png","svg","jpeg","base64"]"#);
    }
}
