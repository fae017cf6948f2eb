use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_or_default};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::error::{VectorError, VectorResult};
use crate::models::{EmbeddingModel, EmbeddingResult};

/// Configuration for an OpenAI-compatible `/embeddings` endpoint.
///
/// Works against api.openai.com as well as self-hosted servers
/// (text-embeddings-inference, infinity, vLLM) serving sentence-transformers models.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl OpenAIConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into(),
        }
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }
}

impl FromEnv for OpenAIConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: std::env::var("EMBEDDING_API_KEY").ok(),
            base_url: env_or_default("EMBEDDING_BASE_URL", "http://localhost:8080/v1"),
        })
    }
}

/// OpenAI-compatible embeddings provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(OpenAIConfig::from_env()?))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingUsage {
    total_tokens: u32,
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    async fn embed(&self, model: &EmbeddingModel, text: &str) -> VectorResult<EmbeddingResult> {
        let results = self.embed_batch(model, &[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| VectorError::Malformed("No embedding returned".to_string()))
    }

    async fn embed_batch(
        &self,
        model: &EmbeddingModel,
        texts: &[String],
    ) -> VectorResult<Vec<EmbeddingResult>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbeddingRequest {
            model: model.model_name(),
            input: texts,
            dimensions: model.dimensions,
        };

        let mut builder = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .json(&request);

        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = format!("Embedding API error ({}): {}", status, error_text);
            return Err(if status.is_server_error() {
                VectorError::Unavailable(message)
            } else {
                VectorError::Embedding(message)
            });
        }

        let embedding_response: EmbeddingResponse = response.json().await?;

        if embedding_response.data.len() != texts.len() {
            return Err(VectorError::Malformed(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embedding_response.data.len()
            )));
        }

        let mut data = embedding_response.data;
        data.sort_by_key(|d| d.index);

        let tokens_per_embedding = embedding_response
            .usage
            .map(|u| u.total_tokens / texts.len() as u32)
            .unwrap_or_default();

        Ok(data
            .into_iter()
            .map(|d| EmbeddingResult {
                dimension: d.embedding.len() as u32,
                values: d.embedding,
                tokens_used: tokens_per_embedding,
            })
            .collect())
    }
}
