mod search;

use axum::{Json, Router, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::models::{MessageHit, SearchResponse};
use crate::repository::MessageRepository;
use crate::service::MessageSearchService;

pub use search::{DEFAULT_SEARCH_LIMIT, HealthResponse, SearchParams};

/// OpenAPI documentation for the search API
#[derive(OpenApi)]
#[openapi(
    paths(search::search_vector, search::health),
    components(schemas(SearchResponse, MessageHit, HealthResponse)),
    tags(
        (name = "search", description = "Semantic search over indexed messages")
    )
)]
pub struct SearchApiDoc;

/// Create the search router: `/search/vector`, `/health` and `/api-docs/openapi.json`
pub fn router<R: MessageRepository + 'static>(service: MessageSearchService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/search/vector", get(search::search_vector::<R>))
        .route("/health", get(search::health::<R>))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(SearchApiDoc::openapi()) }),
        )
        .with_state(shared_service)
}
