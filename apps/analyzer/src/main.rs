mod analysis;
mod config;
mod errors;
mod llm_client;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::document::DocumentRenderer;
use crate::analysis::evaluator::Evaluator;
use crate::analysis::rasterizer::PdfiumRasterizer;
use crate::analysis::session::SessionStore;
use crate::config::Config;
use crate::llm_client::GeminiClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume ATS Analyzer v{}", env!("CARGO_PKG_VERSION"));
    if config.google_api_key.trim().is_empty() {
        warn!("GOOGLE_API_KEY is not set; every evaluation will fail authentication");
    }

    // Initialize PDF rasterizer (dedicated pdfium thread)
    let rasterizer = PdfiumRasterizer::spawn(config.pdfium_library_path.as_deref())
        .context("PDF rendering is unavailable")?;
    let renderer = DocumentRenderer::new(Arc::new(rasterizer));

    // Initialize LLM client
    let gemini = GeminiClient::new(
        config.google_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_api_base.clone(),
        Duration::from_secs(config.llm_timeout_secs),
    )?;
    info!("LLM client initialized (model: {})", gemini.model());
    let evaluator = Evaluator::new(Arc::new(gemini));

    let sessions = Arc::new(SessionStore::new(Duration::from_secs(config.session_ttl_secs)));

    let state = AppState {
        renderer,
        evaluator,
        sessions,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
