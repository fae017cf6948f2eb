//! REST handlers for message search

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::VectorResult;
use crate::models::SearchResponse;
use crate::repository::MessageRepository;
use crate::service::MessageSearchService;

/// Default number of hits returned when the caller does not pass `limit`.
pub const DEFAULT_SEARCH_LIMIT: u32 = 40_000;

fn default_limit() -> u32 {
    DEFAULT_SEARCH_LIMIT
}

/// Query string of `GET /search/vector`
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SearchParams {
    /// The search query
    pub query: String,
    /// Number of results to return
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Semantic search over the message corpus
///
/// Embeds the query and returns every stored message whose similarity
/// reaches the configured score threshold.
#[utoipa::path(
    get,
    path = "/search/vector",
    tag = "search",
    params(SearchParams),
    responses(
        (status = 200, description = "Search results", body = SearchResponse),
        (status = 400, description = "Invalid query"),
        (status = 503, description = "Vector search service unavailable"),
        (status = 500, description = "Search error")
    )
)]
pub async fn search_vector<R: MessageRepository>(
    State(service): State<Arc<MessageSearchService<R>>>,
    Query(params): Query<SearchParams>,
) -> VectorResult<Json<SearchResponse>> {
    let results = service.search(&params.query, params.limit).await?;
    Ok(Json(SearchResponse::new(params.query, results)))
}

/// Liveness and Qdrant reachability
#[utoipa::path(
    get,
    path = "/health",
    tag = "search",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Vector store unreachable")
    )
)]
pub async fn health<R: MessageRepository>(
    State(service): State<Arc<MessageSearchService<R>>>,
) -> VectorResult<Json<HealthResponse>> {
    service.health_check().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}
