use async_trait::async_trait;

use crate::error::VectorResult;
use crate::models::{EmbeddingModel, EmbeddingResult};

/// Trait for embedding generation providers
///
/// Query text must be embedded with the same model the corpus was indexed
/// with, otherwise scores are meaningless.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name for logging
    fn name(&self) -> &'static str;

    /// Generate embedding for a single text
    async fn embed(&self, model: &EmbeddingModel, text: &str) -> VectorResult<EmbeddingResult>;

    /// Generate embeddings for multiple texts in batch
    async fn embed_batch(
        &self,
        model: &EmbeddingModel,
        texts: &[String],
    ) -> VectorResult<Vec<EmbeddingResult>>;
}
