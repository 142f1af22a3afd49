pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Page
        .route("/", get(handlers::handle_index))
        .route("/resume", post(handlers::handle_upload))
        .route("/analyze", post(handlers::handle_analyze))
        .route("/download/:session_id", get(handlers::handle_download))
        // JSON API
        .route("/api/v1/analyze", post(handlers::handle_analyze_api))
        // Resumes of any size are accepted.
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}
