//! Error types for the PlantUML server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use plantuml_engine::{ConvertError, DecodeError, RenderError};

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    MalformedEncoding(String),

    #[error("{0}")]
    UndecodableSource(String),

    #[error("Bad diagram: {0}")]
    BadDiagram(String),

    #[error("Bad request")]
    BadRequest,

    #[error("Render timeout after {0}ms")]
    Timeout(u64),

    #[error("Diagram engine unavailable")]
    EngineUnavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_FORMAT"),
            ServerError::MalformedEncoding(_) => (StatusCode::BAD_REQUEST, "MALFORMED_ENCODING"),
            ServerError::UndecodableSource(_) => (StatusCode::BAD_REQUEST, "UNDECODABLE_SOURCE"),
            ServerError::BadDiagram(_) => (StatusCode::BAD_REQUEST, "BAD_DIAGRAM"),
            ServerError::BadRequest => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ServerError::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "TIMEOUT"),
            ServerError::EngineUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "ENGINE_UNAVAILABLE")
            }
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ConvertError> for ServerError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::UnsupportedFormat(e) => ServerError::UnsupportedFormat(e.to_string()),
            ConvertError::Decode(e @ DecodeError::MalformedEncoding) => {
                ServerError::MalformedEncoding(e.to_string())
            }
            ConvertError::Decode(e @ DecodeError::UndecodableSource) => {
                ServerError::UndecodableSource(e.to_string())
            }
            ConvertError::Render(RenderError::BadDiagram(msg)) => ServerError::BadDiagram(msg),
            // Malformed input is the likely cause, so this is the client's error
            ConvertError::Render(RenderError::EngineIo(detail)) => {
                error!("Engine IO failure: {}", detail);
                ServerError::BadRequest
            }
            ConvertError::Render(RenderError::EngineUnavailable(detail)) => {
                error!("Diagram engine unavailable: {}", detail);
                ServerError::EngineUnavailable
            }
            ConvertError::Render(RenderError::UnsupportedFormat(format)) => {
                ServerError::UnsupportedFormat(format!("Unsupported output format: {}", format))
            }
            ConvertError::Timeout(ms) => ServerError::Timeout(ms),
            ConvertError::Internal(msg) => ServerError::Internal(msg),
        }
    }
}
