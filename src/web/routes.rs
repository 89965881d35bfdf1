use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// REST API for the query service
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Liveness
        .route("/health", get(handlers::api::health))

        // Schema display
        .route("/schema", get(handlers::api::get_schema))

        // Question / SQL execution
        .route("/query", post(handlers::api::query))

        // System status
        .route("/status", get(handlers::api::system_status))
}
