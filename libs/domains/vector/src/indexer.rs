//! Corpus indexing
//!
//! Embeds message text in fixed-size batches and upserts the vectors with
//! their payload. Point ids are corpus row positions, so indexing the same
//! file again replaces points rather than duplicating them.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::embedding::EmbeddingProvider;
use crate::error::{VectorError, VectorResult};
use crate::models::{EmbeddingModel, IndexedMessage, MessagePayload};
use crate::repository::MessageRepository;

/// Messages embedded per provider call.
pub const DEFAULT_INDEX_BATCH_SIZE: usize = 32;

/// Output dimension of the default embedding model.
pub const DEFAULT_VECTOR_DIMENSION: u64 = 384;

/// What an indexing run wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub created_collection: bool,
    pub batches: usize,
    pub indexed: usize,
}

pub struct MessageIndexer<R: MessageRepository> {
    repository: R,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    model: EmbeddingModel,
    batch_size: usize,
    dimension: u64,
}

impl<R: MessageRepository> MessageIndexer<R> {
    pub fn new(repository: R, embedding_provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            repository,
            embedding_provider,
            model: EmbeddingModel::default(),
            batch_size: DEFAULT_INDEX_BATCH_SIZE,
            dimension: DEFAULT_VECTOR_DIMENSION,
        }
    }

    pub fn with_model(mut self, model: EmbeddingModel) -> Self {
        self.model = model;
        self
    }

    /// Set the batch size (at least 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_dimension(mut self, dimension: u64) -> Self {
        self.dimension = dimension;
        self
    }

    /// Index `messages` in order, calling `on_batch` with the running count
    /// after every batch is stored.
    ///
    /// Stops at the first failed batch; batches already stored stay stored.
    #[instrument(skip_all, fields(messages = messages.len(), batch_size = self.batch_size))]
    pub async fn index<F>(
        &self,
        messages: &[MessagePayload],
        mut on_batch: F,
    ) -> VectorResult<IndexSummary>
    where
        F: FnMut(usize),
    {
        let mut summary = IndexSummary {
            created_collection: self.repository.ensure_collection(self.dimension).await?,
            ..IndexSummary::default()
        };

        for (batch_no, batch) in messages.chunks(self.batch_size).enumerate() {
            let first_id = (batch_no * self.batch_size) as u64;
            summary.indexed += self.index_batch(first_id, batch).await?;
            summary.batches += 1;
            on_batch(summary.indexed);
        }

        info!(
            indexed = summary.indexed,
            batches = summary.batches,
            created_collection = summary.created_collection,
            "Indexing complete"
        );
        Ok(summary)
    }

    /// Embed and store one batch, numbering points from `first_id`.
    pub async fn index_batch(&self, first_id: u64, batch: &[MessagePayload]) -> VectorResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = batch.iter().map(|m| m.message.clone()).collect();
        let embeddings = self
            .embedding_provider
            .embed_batch(&self.model, &texts)
            .await?;

        if embeddings.len() != batch.len() {
            return Err(VectorError::Malformed(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                embeddings.len()
            )));
        }

        let mut points = Vec::with_capacity(batch.len());
        for (offset, (payload, embedding)) in batch.iter().zip(embeddings).enumerate() {
            if embedding.values.len() as u64 != self.dimension {
                return Err(VectorError::Validation(format!(
                    "embedding has {} dimensions, collection expects {}",
                    embedding.values.len(),
                    self.dimension
                )));
            }
            points.push(IndexedMessage {
                id: first_id + offset as u64,
                vector: embedding.values,
                payload: payload.clone(),
                embedding_model: self.model.name.clone(),
            });
        }

        let written = self.repository.upsert_batch(points).await?;
        debug!(first_id, written, "Stored batch");
        Ok(written)
    }
}
