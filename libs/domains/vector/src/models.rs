use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Default embedding model used when indexing the message corpus.
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L12-v2";

/// Payload stored alongside every indexed message point.
///
/// Fields missing from a stored payload decode as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct MessagePayload {
    pub time: String,
    pub location: String,
    pub account: String,
    pub message: String,
}

impl MessagePayload {
    pub fn new(
        time: impl Into<String>,
        location: impl Into<String>,
        account: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            time: time.into(),
            location: location.into(),
            account: account.into(),
            message: message.into(),
        }
    }
}

/// Search query parameters
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchQuery {
    pub vector: Vec<f32>,
    pub limit: u32,
    pub score_threshold: Option<f32>,
    pub with_payloads: bool,
}

impl SearchQuery {
    pub fn new(vector: Vec<f32>, limit: u32) -> Self {
        Self {
            vector,
            limit,
            score_threshold: None,
            with_payloads: true,
        }
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }
}

/// A message ready to be written to the store
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedMessage {
    /// Row position in the source corpus
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: MessagePayload,
    /// Model that produced `vector`, stored alongside the payload
    pub embedding_model: String,
}

/// A stored message returned by a similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScoredMessage {
    pub id: String,
    pub score: f32,
    pub payload: MessagePayload,
}

/// One hit of the `/search/vector` endpoint.
///
/// `label` echoes the query text that produced the hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessageHit {
    pub time: String,
    pub location: String,
    pub account: String,
    pub message: String,
    pub label: String,
    pub score: f32,
}

impl MessageHit {
    pub fn from_scored(scored: ScoredMessage, query: &str) -> Self {
        let MessagePayload {
            time,
            location,
            account,
            message,
        } = scored.payload;

        Self {
            time,
            location,
            account,
            message,
            label: query.to_string(),
            score: scored.score,
        }
    }
}

/// Body of the `/search/vector` response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<MessageHit>,
    pub query: String,
    pub total_results: usize,
}

impl SearchResponse {
    pub fn new(query: impl Into<String>, results: Vec<MessageHit>) -> Self {
        Self {
            total_results: results.len(),
            query: query.into(),
            results,
        }
    }
}

/// Embedding model selection.
///
/// The corpus is indexed with a sentence-transformers model served behind an
/// OpenAI-compatible `/embeddings` endpoint, so the model is identified by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EmbeddingModel {
    pub name: String,
    /// Request a specific output dimension from providers that support it.
    pub dimensions: Option<u32>,
}

impl EmbeddingModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimensions: None,
        }
    }

    pub fn with_dimensions(mut self, dimensions: u32) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn model_name(&self) -> &str {
        &self.name
    }
}

impl Default for EmbeddingModel {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_MODEL)
    }
}

/// Embedding result
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmbeddingResult {
    pub values: Vec<f32>,
    pub dimension: u32,
    pub tokens_used: u32,
}
