//! API Routes
//!
//! Configures the Axum router with the cache management endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, health_handler, invalidate_handler, schedule_handler, stats_handler,
    unschedule_handler, warmup_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /cache/stats` - Metrics snapshot
/// - `POST /cache/warmup` - Run warmup strategies or explicit queries
/// - `DELETE /cache/invalidate` - Invalidate by pattern or entity
/// - `DELETE /cache/clear` - Empty every store and reset metrics
/// - `POST /cache/warmup/schedule` - Install the periodic warmup timer
/// - `DELETE /cache/warmup/schedule` - Cancel the periodic warmup timer
/// - `GET /health` - Health check endpoint
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let cache_routes = Router::new()
        .route("/stats", get(stats_handler))
        .route("/warmup", post(warmup_handler))
        .route("/invalidate", delete(invalidate_handler))
        .route("/clear", delete(clear_handler))
        .route(
            "/warmup/schedule",
            post(schedule_handler).delete(unschedule_handler),
        );

    Router::new()
        .nest("/cache", cache_routes)
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
