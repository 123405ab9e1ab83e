//! API Routes
//!
//! Configures the Axum router for the admin endpoint.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{admin_handler, health_handler, snapshot_handler, stats_handler, AppState};

/// Creates the admin router.
///
/// # Endpoints
/// - `GET /admin` - HTML metrics page
/// - `GET /stats` - Metrics as JSON
/// - `GET /health` - Health check endpoint
/// - `POST /snapshot` - Persist the cache now
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/admin", get(admin_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .route("/snapshot", post(snapshot_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
