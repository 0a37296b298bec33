use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// Liveness only, no dependency checks
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(handlers::api::health))
}

// API Routes - REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            .route("/chat", post(handlers::api::chat))
            .route("/status", get(handlers::api::system_status)),
    )
}
