//! API request handlers

use super::query::{HierarchyQuery, PaginatedResponse, SyncRequest, TopicListQuery};
use crate::cache::CacheStats;
use crate::shadow::{ShadowError, SyncOutcome};
use crate::topics::{Forest, HierarchyError, Topic, TopicContext, TopicStats, TopicsService};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

/// Shared server state
pub struct ServerState {
    pub topics: Arc<TopicsService>,
}

/// Shared handler state
pub type TopicsState = Arc<ServerState>;

// ============================================================================
// Health check
// ============================================================================

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub neo4j: String,
}

/// Health check handler.
///
/// Returns 200 + `"ok"` when the graph answers, 503 + `"unhealthy"` otherwise.
pub async fn health(State(state): State<TopicsState>) -> (StatusCode, Json<HealthResponse>) {
    let neo4j_ok = state
        .topics
        .repository()
        .health_check()
        .await
        .unwrap_or(false);

    let (http_status, status, neo4j) = if neo4j_ok {
        (StatusCode::OK, "ok", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            neo4j: neo4j.to_string(),
        }),
    )
}

// ============================================================================
// Topics
// ============================================================================

/// List topics: search when `search` is set, else one level when `level` is
/// set, else everything. Results are paginated in memory.
pub async fn list_topics(
    State(state): State<TopicsState>,
    Query(query): Query<TopicListQuery>,
) -> Result<Json<PaginatedResponse<Topic>>, AppError> {
    query.pagination.validate().map_err(AppError::BadRequest)?;

    let topics = if let Some(term) = query.search_term() {
        state.topics.search(term, true).await
    } else if let Some(level) = query.level {
        state.topics.get_by_level(level, true).await
    } else {
        state.topics.get_all(true, true).await
    };

    Ok(Json(query.pagination.paginate(topics)))
}

/// Get one topic by graph id
pub async fn get_topic(
    State(state): State<TopicsState>,
    Path(topic_id): Path<String>,
) -> Result<Json<Topic>, AppError> {
    let topic = state
        .topics
        .get_by_id(&topic_id, true)
        .await?
        .ok_or(AppError::NotFound("Topic not found".into()))?;
    Ok(Json(topic))
}

/// Get one topic by its shadow-store slug
pub async fn get_topic_by_slug(
    State(state): State<TopicsState>,
    Path(slug): Path<String>,
) -> Result<Json<Topic>, AppError> {
    let topic = state
        .topics
        .get_by_slug(&slug)
        .await?
        .ok_or(AppError::NotFound("Topic not found".into()))?;
    Ok(Json(topic))
}

/// Get a topic with parent, children, siblings and breadcrumbs
pub async fn get_topic_context(
    State(state): State<TopicsState>,
    Path(topic_id): Path<String>,
) -> Result<Json<TopicContext>, AppError> {
    let context = state
        .topics
        .get_context(&topic_id)
        .await?
        .ok_or(AppError::NotFound("Topic not found".into()))?;
    Ok(Json(context))
}

/// Get the topic forest, or the subtree under `root`
pub async fn get_hierarchy(
    State(state): State<TopicsState>,
    Query(query): Query<HierarchyQuery>,
) -> Result<Json<Forest>, AppError> {
    let root = query.root.as_deref().filter(|r| !r.is_empty());
    let forest = state
        .topics
        .get_hierarchy(root)
        .await?
        .ok_or(AppError::NotFound("Root topic not found".into()))?;
    Ok(Json(forest))
}

/// Aggregate statistics
pub async fn get_stats(State(state): State<TopicsState>) -> Json<TopicStats> {
    Json(state.topics.stats().await)
}

// ============================================================================
// Maintenance
// ============================================================================

/// Run a full sync into the shadow store
pub async fn sync_topics(
    State(state): State<TopicsState>,
    Json(req): Json<SyncRequest>,
) -> (StatusCode, Json<SyncOutcome>) {
    let outcome = state.topics.sync(req.force).await;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(outcome))
}

pub async fn get_cache_stats(State(state): State<TopicsState>) -> Json<CacheStats> {
    Json(state.topics.cache_stats().await)
}

/// Drop the cached listings and hierarchy
pub async fn clear_cache(State(state): State<TopicsState>) -> StatusCode {
    state.topics.clear_cache().await;
    StatusCode::NO_CONTENT
}

// ============================================================================
// Error handling
// ============================================================================

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<ShadowError> for AppError {
    fn from(err: ShadowError) -> Self {
        AppError::Internal(err.into())
    }
}

impl From<HierarchyError> for AppError {
    fn from(err: HierarchyError) -> Self {
        AppError::Internal(err.into())
    }
}
