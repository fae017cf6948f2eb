//! Message Search HTTP API
//!
//! Serves similarity search over the indexed disaster-message corpus.
//!
//! ## Architecture
//!
//! ```text
//! Browser dashboard / labeler
//!   ↓ GET /search/vector?query=..&limit=..
//! axum router (domain_vector::router)
//!   ↓
//! MessageSearchService
//!   ↓                    ↓
//! EmbeddingProvider   QdrantRepository
//! ```
//!
//! ## Endpoints
//!
//! - `GET /search/vector`: messages similar to `query`, labelled with it
//! - `GET /health`: 200 when Qdrant answers, 503 otherwise
//! - `GET /api-docs/openapi.json`: OpenAPI document

pub mod server;

pub use server::run;
