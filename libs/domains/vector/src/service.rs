use std::sync::Arc;

use tracing::{debug, instrument};

use crate::embedding::EmbeddingProvider;
use crate::error::{VectorError, VectorResult};
use crate::models::{EmbeddingModel, MessageHit, MessagePayload, SearchQuery};
use crate::repository::MessageRepository;

/// Page size used when reading the whole corpus back out of the store.
pub const SCROLL_PAGE_SIZE: u32 = 10_000;

/// Message search service
///
/// Embeds query text with the corpus embedding model and runs a
/// threshold-filtered similarity search against the repository.
pub struct MessageSearchService<R: MessageRepository> {
    repository: R,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    model: EmbeddingModel,
    score_threshold: Option<f32>,
}

impl<R: MessageRepository> MessageSearchService<R> {
    pub fn new(repository: R, embedding_provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            repository,
            embedding_provider,
            model: EmbeddingModel::default(),
            score_threshold: None,
        }
    }

    pub fn with_model(mut self, model: EmbeddingModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    /// Search the corpus for messages similar to `query`.
    ///
    /// Hits come back ordered by descending score, each labelled with the query.
    #[instrument(skip(self), fields(threshold = ?self.score_threshold))]
    pub async fn search(&self, query: &str, limit: u32) -> VectorResult<Vec<MessageHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(VectorError::Validation("query must not be empty".to_string()));
        }
        if limit == 0 {
            return Err(VectorError::Validation("limit must be positive".to_string()));
        }

        let embedding = self.embedding_provider.embed(&self.model, query).await?;

        let search = SearchQuery::new(embedding.values, limit);
        let search = match self.score_threshold {
            Some(threshold) => search.with_score_threshold(threshold),
            None => search,
        };

        let scored = self.repository.search(search).await?;
        debug!(hits = scored.len(), "Search completed");

        Ok(scored
            .into_iter()
            .map(|s| MessageHit::from_scored(s, query))
            .collect())
    }

    /// Every stored message payload, in store order.
    pub async fn corpus(&self) -> VectorResult<Vec<MessagePayload>> {
        self.repository.scroll_all(SCROLL_PAGE_SIZE).await
    }

    pub async fn health_check(&self) -> VectorResult<()> {
        self.repository.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingProvider;
    use crate::models::{EmbeddingResult, ScoredMessage};
    use crate::repository::MockMessageRepository;

    fn embedding_of(values: Vec<f32>) -> MockEmbeddingProvider {
        let mut provider = MockEmbeddingProvider::new();
        provider.expect_embed().returning(move |_, _| {
            Ok(EmbeddingResult {
                dimension: values.len() as u32,
                values: values.clone(),
                tokens_used: 1,
            })
        });
        provider
    }

    #[tokio::test]
    async fn test_search_embeds_and_applies_threshold() {
        let mut repository = MockMessageRepository::new();
        repository
            .expect_search()
            .withf(|q| q.limit == 500 && q.score_threshold == Some(0.2) && q.vector == vec![1.0, 0.0])
            .times(1)
            .returning(|_| {
                Ok(vec![ScoredMessage {
                    id: "1".to_string(),
                    score: 0.8,
                    payload: MessagePayload::new("t1", "Downtown", "u1", "water everywhere"),
                }])
            });

        let service = MessageSearchService::new(repository, Arc::new(embedding_of(vec![1.0, 0.0])))
            .with_score_threshold(0.2);

        let hits = service.search("  flood ", 500).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label, "flood");
        assert_eq!(hits[0].score, 0.8);
    }

    #[tokio::test]
    async fn test_search_without_threshold_sends_none() {
        let mut repository = MockMessageRepository::new();
        repository
            .expect_search()
            .withf(|q| q.score_threshold.is_none() && q.limit == 5)
            .times(1)
            .returning(|_| Ok(vec![]));

        let service = MessageSearchService::new(repository, Arc::new(embedding_of(vec![0.5])));
        assert!(service.search("quake", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_rejects_blank_query() {
        let service = MessageSearchService::new(
            MockMessageRepository::new(),
            Arc::new(MockEmbeddingProvider::new()),
        );
        let err = service.search("   ", 10).await.unwrap_err();
        assert!(matches!(err, VectorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_search_propagates_unavailable() {
        let mut repository = MockMessageRepository::new();
        repository
            .expect_search()
            .returning(|_| Err(VectorError::Unavailable("connection refused".to_string())));

        let service = MessageSearchService::new(repository, Arc::new(embedding_of(vec![0.3])));
        let err = service.search("fire", 10).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_corpus_scrolls_with_page_size() {
        let mut repository = MockMessageRepository::new();
        repository
            .expect_scroll_all()
            .withf(|page| *page == SCROLL_PAGE_SIZE)
            .returning(|_| Ok(vec![MessagePayload::new("t1", "l", "u1", "m")]));

        let service =
            MessageSearchService::new(repository, Arc::new(MockEmbeddingProvider::new()));
        assert_eq!(service.corpus().await.unwrap().len(), 1);
    }
}
