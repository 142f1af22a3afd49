use std::sync::Arc;

use crate::analysis::document::DocumentRenderer;
use crate::analysis::evaluator::Evaluator;
use crate::analysis::session::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub renderer: DocumentRenderer,
    /// Wraps the model behind `GenerativeModel`; tests swap in a fake.
    pub evaluator: Evaluator,
    pub sessions: Arc<SessionStore>,
}
