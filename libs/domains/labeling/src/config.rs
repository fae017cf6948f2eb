//! Labeling run configuration
//!
//! `FanOutConfig` shapes how term queries are issued; `LabelingConfig` adds the
//! run-level error policy. Both load from `LABELER_*` environment variables.

use std::time::Duration;

use core_config::{ConfigError, FromEnv, env_flag, env_parse};

/// Default number of term queries in flight at once.
pub const DEFAULT_MAX_CONCURRENT_QUERIES: usize = 30;

/// Default per-term result limit.
pub const DEFAULT_QUERY_LIMIT: u32 = 40_000;

/// Configuration for the fan-out scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutConfig {
    /// Maximum searches in flight
    pub max_concurrent_queries: usize,

    /// `limit` passed to every search
    pub query_limit: u32,

    /// Extra attempts after an unavailable answer (0 = no retry)
    pub max_retries: u32,

    /// Backoff before the first retry, doubled per attempt
    pub base_backoff_ms: u64,

    /// Upper bound on a single backoff
    pub max_backoff_ms: u64,

    /// Deadline for one search attempt
    pub query_timeout_secs: u64,
}

impl FanOutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency cap (at least 1)
    pub fn with_max_concurrent_queries(mut self, n: usize) -> Self {
        self.max_concurrent_queries = n.max(1);
        self
    }

    /// Set the per-term result limit (at least 1)
    pub fn with_query_limit(mut self, limit: u32) -> Self {
        self.query_limit = limit.max(1);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_backoff_ms(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.base_backoff_ms = base_ms;
        self.max_backoff_ms = max_ms.max(base_ms);
        self
    }

    pub fn with_query_timeout_secs(mut self, secs: u64) -> Self {
        self.query_timeout_secs = secs.max(1);
        self
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.base_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            max_concurrent_queries: DEFAULT_MAX_CONCURRENT_QUERIES,
            query_limit: DEFAULT_QUERY_LIMIT,
            max_retries: 0,
            base_backoff_ms: 200,
            max_backoff_ms: 5_000,
            query_timeout_secs: 60,
        }
    }
}

impl FromEnv for FanOutConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self::new()
            .with_max_concurrent_queries(env_parse(
                "LABELER_MAX_CONCURRENCY",
                defaults.max_concurrent_queries,
            )?)
            .with_query_limit(env_parse("LABELER_QUERY_LIMIT", defaults.query_limit)?)
            .with_max_retries(env_parse("LABELER_MAX_RETRIES", defaults.max_retries)?)
            .with_backoff_ms(
                env_parse("LABELER_BASE_BACKOFF_MS", defaults.base_backoff_ms)?,
                env_parse("LABELER_MAX_BACKOFF_MS", defaults.max_backoff_ms)?,
            )
            .with_query_timeout_secs(env_parse(
                "LABELER_QUERY_TIMEOUT_SECS",
                defaults.query_timeout_secs,
            )?))
    }
}

/// Configuration for a whole labeling run
#[derive(Debug, Clone, PartialEq)]
pub struct LabelingConfig {
    pub fan_out: FanOutConfig,

    /// Abort the run when the search service is down as a whole
    pub fail_on_total_outage: bool,

    /// Pre-seed the reducer with the full corpus so unlabeled messages are counted
    pub seed_from_corpus: bool,
}

impl LabelingConfig {
    pub fn new(fan_out: FanOutConfig) -> Self {
        Self {
            fan_out,
            ..Self::default()
        }
    }

    pub fn with_fail_on_total_outage(mut self, fail: bool) -> Self {
        self.fail_on_total_outage = fail;
        self
    }

    pub fn with_seed_from_corpus(mut self, seed: bool) -> Self {
        self.seed_from_corpus = seed;
        self
    }
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            fan_out: FanOutConfig::default(),
            fail_on_total_outage: true,
            seed_from_corpus: true,
        }
    }
}

impl FromEnv for LabelingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            fan_out: FanOutConfig::from_env()?,
            fail_on_total_outage: env_flag("LABELER_FAIL_ON_TOTAL_OUTAGE", true)?,
            seed_from_corpus: env_flag("LABELER_SEED_FROM_CORPUS", true)?,
        })
    }
}
