use std::sync::Arc;

use async_trait::async_trait;
use domain_vector::{MessageRepository, MessageSearchService, VectorError};

use super::SearchPort;
use crate::error::SearchPortError;
use crate::models::SearchMatch;

/// Search port that runs the embedding and store query in-process
pub struct DirectSearchPort<R: MessageRepository> {
    service: Arc<MessageSearchService<R>>,
}

impl<R: MessageRepository> DirectSearchPort<R> {
    pub fn new(service: Arc<MessageSearchService<R>>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<MessageSearchService<R>> {
        &self.service
    }
}

impl From<VectorError> for SearchPortError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::Unavailable(msg) => SearchPortError::ServiceUnavailable(msg),
            VectorError::Malformed(msg) => SearchPortError::MalformedResponse(msg),
            other => SearchPortError::Rejected(other.to_string()),
        }
    }
}

#[async_trait]
impl<R: MessageRepository + 'static> SearchPort for DirectSearchPort<R> {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchMatch>, SearchPortError> {
        let hits = self.service.search(query, limit).await?;
        Ok(hits.into_iter().map(SearchMatch::from).collect())
    }

    async fn health_check(&self) -> Result<(), SearchPortError> {
        Ok(self.service.health_check().await?)
    }
}
