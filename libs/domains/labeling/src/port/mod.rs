//! Vector Search Port
//!
//! The capability the scheduler fans out over: turn a text query into a
//! ranked, already score-filtered list of matches. Adapters do not retry.

mod direct;
mod http;

pub use direct::DirectSearchPort;
pub use http::{DEFAULT_SEARCH_API_URL, HttpSearchPort};

use async_trait::async_trait;

use crate::error::SearchPortError;
use crate::models::SearchMatch;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchPort: Send + Sync {
    /// Matches for `query`, best first. An empty list is a valid answer.
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchMatch>, SearchPortError>;

    /// Cheap reachability probe run before a labeling run starts.
    async fn health_check(&self) -> Result<(), SearchPortError> {
        Ok(())
    }
}
