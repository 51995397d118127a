//! Annotator Service Library
//!
//! HTTP handlers and types for the route annotation service.
//! This library is used by both the annotator-service binary and integration tests.

pub mod handlers;

use std::sync::Arc;

use annotator::AnnotatorService;
use axum::{
    routing::{get, post},
    Router,
};

/// Application state shared across handlers.
pub struct AppState {
    /// Annotation pipeline over the loaded extract.
    pub annotator: AnnotatorService,
}

/// Build the annotation routes over the given state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/nodelist", post(handlers::post_nodelist))
        .route("/nodelist/:nodelist", get(handlers::get_nodelist))
        .route("/coordlist", post(handlers::post_coordlist))
        .route("/coordlist/:coordlist", get(handlers::get_coordlist))
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        .with_state(state)
}

// Re-export commonly used types for convenience
pub use handlers::{CoordListRequest, HealthResponse, NodeListRequest, StatsResponse};
