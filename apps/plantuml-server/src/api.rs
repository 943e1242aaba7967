//! API handlers for the PlantUML server
//!
//! Provides REST endpoints for:
//! - Diagram conversion from share-link tokens
//! - Diagram conversion from a plain-text body
//! - Health check

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use plantuml_engine::{
    convert_document, ConvertRequest, FileFormat, RenderResult, SourceInput, SUPPORTED_FORMATS,
};

use crate::error::ServerError;
use crate::AppState;

/// All routes, without middleware
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/plantuml/:output_format/:source_encoded",
            get(handle_convert_encoded),
        )
        .route("/plantuml/:output_format", post(handle_convert_body))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub formats: &'static [FileFormat],
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "plantuml-server",
        version: env!("CARGO_PKG_VERSION"),
        formats: &SUPPORTED_FORMATS,
    })
}

/// Handler: GET /plantuml/:output_format/:source_encoded
pub async fn handle_convert_encoded(
    State(state): State<AppState>,
    Path((output_format, source_encoded)): Path<(String, String)>,
) -> Result<Response, ServerError> {
    info!(
        "Convert request: format={}, encoded_len={}",
        output_format,
        source_encoded.len()
    );

    let request = ConvertRequest {
        output_format,
        source: SourceInput::Encoded(source_encoded),
    };
    convert(&state, request).await
}

/// Handler: POST /plantuml/:output_format
///
/// The body is plain diagram source, not transport-encoded.
pub async fn handle_convert_body(
    State(state): State<AppState>,
    Path(output_format): Path<String>,
    body: String,
) -> Result<Response, ServerError> {
    info!(
        "Convert request: format={}, body_len={}",
        output_format,
        body.len()
    );

    let request = ConvertRequest {
        output_format,
        source: SourceInput::Plain(body),
    };
    convert(&state, request).await
}

async fn convert(state: &AppState, request: ConvertRequest) -> Result<Response, ServerError> {
    let result = convert_document(state.engine.clone(), request, state.timeout_ms).await?;
    Ok(image_response(result))
}

fn image_response(result: RenderResult) -> Response {
    ([(header::CONTENT_TYPE, result.content_type)], result.bytes).into_response()
}
