//! PlantUML Render Server
//!
//! Renders PlantUML diagrams from share-link tokens. Provides REST API
//! endpoints for:
//!
//! - Diagram rendering (PNG/SVG/JPEG/base64 data URI)
//! - Health check
//!
//! ## Architecture
//!
//! Requests are decoded, sanitized and rendered by `plantuml-engine`; the
//! rendering itself runs on tokio's blocking pool through the PlantUML jar.
//! The server adds:
//!
//! - Rate limiting via tower-governor
//! - Request tracing
//! - Render timeout

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use plantuml_engine::{DiagramEngine, PlantUmlConfig, PlantUmlEngine};

mod api;
mod error;

/// Command-line arguments for the PlantUML server
#[derive(Parser, Debug)]
#[command(name = "plantuml-server")]
#[command(about = "PlantUML diagram rendering server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Render timeout in milliseconds
    #[arg(long, env = "RENDER_TIMEOUT_MS", default_value = "10000")]
    timeout_ms: u64,

    /// Rate limit: requests per second per IP
    #[arg(long, env = "RATE_LIMIT", default_value = "10")]
    rate_limit: u32,

    /// Java executable used to run PlantUML
    #[arg(long, env = "JAVA_BIN", default_value = "java")]
    java: PathBuf,

    /// Path to plantuml.jar
    #[arg(long, env = "PLANTUML_JAR", default_value = "plantuml.jar")]
    plantuml_jar: PathBuf,

    /// PlantUML security profile passed to the engine
    #[arg(long, env = "PLANTUML_SECURITY_PROFILE", default_value = "SANDBOX")]
    security_profile: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Rendering engine shared by all requests
    pub engine: Arc<dyn DiagramEngine>,
    /// Render timeout in milliseconds
    pub timeout_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PlantUML server on {}:{}", args.host, args.port);

    let engine = PlantUmlEngine::new(PlantUmlConfig {
        java: args.java,
        jar: args.plantuml_jar,
        security_profile: args.security_profile,
    });
    let probe = engine.clone();
    match tokio::task::spawn_blocking(move || probe.check()).await? {
        Ok(version) => info!("Diagram engine: {}", version),
        Err(e) => warn!("Diagram engine check failed, renders will fail: {}", e),
    }

    // Create rate limiter configuration
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.into())
            .burst_size(args.rate_limit * 2)
            .finish()
            .expect("Failed to create rate limiter config"),
    );

    // Create shared state
    let state = AppState {
        engine: Arc::new(engine),
        timeout_ms: args.timeout_ms,
    };

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = api::routes()
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);
    info!("Render timeout: {}ms", args.timeout_ms);

    // The rate limiter keys on the peer address
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
