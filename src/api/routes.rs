//! API Routes
//!
//! Configures the Axum router with the cache admin endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, exists_handler, get_handler, health_handler, invalidate_handler,
    policies_handler, reset_stats_handler, set_handler, stats_handler, AppState,
};

/// Creates the admin router.
///
/// # Endpoints
/// - `GET /health` - Liveness plus L2 reachability
/// - `GET /stats` - Tier info and counters
/// - `POST /stats/reset` - Zero the counters
/// - `GET /policies` - Registered cache policies
/// - `PUT /cache` - Store a JSON value
/// - `GET /cache/:key` - Read through both tiers
/// - `DELETE /cache/:key` - Remove from both tiers
/// - `GET /cache/:key/exists` - Presence check
/// - `POST /cache/invalidate` - Remove keys matching a glob pattern
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/stats/reset", post(reset_stats_handler))
        .route("/policies", get(policies_handler))
        .route("/cache", put(set_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/cache/:key", get(get_handler).delete(delete_handler))
        .route("/cache/:key/exists", get(exists_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
