use async_trait::async_trait;

use crate::error::VectorResult;
use crate::models::{IndexedMessage, MessagePayload, ScoredMessage, SearchQuery};

/// Repository trait for the indexed message corpus
///
/// Abstracts the underlying vector database (Qdrant). The collection is fixed
/// by the repository's configuration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Nearest-neighbour search, ordered by descending score
    async fn search(&self, query: SearchQuery) -> VectorResult<Vec<ScoredMessage>>;

    /// Read every stored payload, page by page
    async fn scroll_all(&self, page_size: u32) -> VectorResult<Vec<MessagePayload>>;

    /// Cheap round-trip to confirm the store is reachable
    async fn health_check(&self) -> VectorResult<()>;

    /// Create the collection with cosine distance if it does not exist yet.
    /// Returns `true` when it was created.
    async fn ensure_collection(&self, dimension: u64) -> VectorResult<bool>;

    /// Insert or replace points by id, waiting for the write to apply.
    /// Returns the number of points written.
    async fn upsert_batch(&self, points: Vec<IndexedMessage>) -> VectorResult<usize>;
}
