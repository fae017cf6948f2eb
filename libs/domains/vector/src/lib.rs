//! Vector Domain Library
//!
//! Semantic search over the indexed message corpus, backed by Qdrant with
//! query embedding through an OpenAI-compatible provider.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ MessageSearchService │  ← embed query, threshold-filtered search
//! │    MessageIndexer    │  ← embed corpus batches, upsert points
//! └──────────┬───────────┘
//!            │
//! ┌──────────▼───────────┐     ┌───────────────────┐
//! │  MessageRepository   │     │ EmbeddingProvider │
//! │       (trait)        │     │      (trait)      │
//! └──────────┬───────────┘     └─────────┬─────────┘
//!            │                           │
//! ┌──────────▼───────────┐     ┌─────────▼─────────┐
//! │   QdrantRepository   │     │  OpenAIProvider   │
//! └──────────────────────┘     └───────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use core_config::FromEnv;
//! use domain_vector::{MessageSearchService, OpenAIProvider, QdrantConfig, QdrantRepository};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = QdrantConfig::from_env()?;
//! let threshold = config.score_threshold;
//! let repository = QdrantRepository::new(config).await?;
//! let service = MessageSearchService::new(repository, Arc::new(OpenAIProvider::from_env()?))
//!     .with_score_threshold(threshold);
//!
//! let hits = service.search("collapsed bridge", 100).await?;
//! # Ok(())
//! # }
//! ```

pub mod embedding;
pub mod error;
pub mod handlers;
pub mod indexer;
pub mod models;
pub mod qdrant;
pub mod repository;
pub mod service;

pub use embedding::{EmbeddingProvider, OpenAIConfig, OpenAIProvider};
pub use error::{VectorError, VectorResult};
pub use handlers::{SearchApiDoc, router};
pub use indexer::{IndexSummary, MessageIndexer};
pub use models::{
    EmbeddingModel, EmbeddingResult, IndexedMessage, MessageHit, MessagePayload, ScoredMessage,
    SearchQuery, SearchResponse,
};
pub use qdrant::{QdrantConfig, QdrantRepository};
pub use repository::MessageRepository;
pub use service::MessageSearchService;
