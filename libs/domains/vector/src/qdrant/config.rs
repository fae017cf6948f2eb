use core_config::{ConfigError, FromEnv, env_or_default, env_parse};

/// Collection the message corpus is indexed into.
pub const DEFAULT_COLLECTION: &str = "earthquake_messages";

/// Minimum similarity a hit must reach to be returned.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.2;

/// Qdrant connection configuration
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub collection: String,
    pub score_threshold: f32,
}

impl QdrantConfig {
    pub fn new(url: String) -> Self {
        Self {
            url,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }
}

impl FromEnv for QdrantConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_or_default("QDRANT_URL", "http://localhost:6334"),
            api_key: std::env::var("QDRANT_API_KEY").ok(),
            timeout_secs: env_parse("QDRANT_TIMEOUT_SECS", 30)?,
            collection: env_or_default("QDRANT_COLLECTION", DEFAULT_COLLECTION),
            score_threshold: env_parse("QDRANT_SCORE_THRESHOLD", DEFAULT_SCORE_THRESHOLD)?,
        })
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            timeout_secs: 30,
            collection: DEFAULT_COLLECTION.to_string(),
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}
