//! API route definitions

use super::handlers::{self, TopicsState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: TopicsState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // ====================================================================
        // Topics
        // ====================================================================
        .route("/api/topics", get(handlers::list_topics))
        .route("/api/topics/hierarchy", get(handlers::get_hierarchy))
        .route("/api/topics/stats", get(handlers::get_stats))
        .route("/api/topics/slug/{slug}", get(handlers::get_topic_by_slug))
        .route("/api/topics/{topic_id}", get(handlers::get_topic))
        .route(
            "/api/topics/{topic_id}/context",
            get(handlers::get_topic_context),
        )
        // ====================================================================
        // Maintenance
        // ====================================================================
        .route("/api/topics/sync", post(handlers::sync_topics))
        .route(
            "/api/topics/cache",
            get(handlers::get_cache_stats).delete(handlers::clear_cache),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
