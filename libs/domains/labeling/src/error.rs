use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single Vector Search Port call.
///
/// The scheduler retries `ServiceUnavailable` (when configured) and treats
/// every other variant as permanent for that term.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SearchPortError {
    /// The search service or the store behind it could not be reached.
    #[error("Search service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The service answered, but the body could not be decoded.
    #[error("Malformed search response: {0}")]
    MalformedResponse(String),

    /// The service refused or failed the query for another reason.
    #[error("Search rejected: {0}")]
    Rejected(String),
}

impl SearchPortError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SearchPortError::ServiceUnavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Failed to read taxonomy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse taxonomy JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid taxonomy: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Run-level failures. Any of these means no output is produced.
#[derive(Debug, Error)]
pub enum LabelingError {
    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),

    #[error("Vector search service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Labeling run cancelled")]
    Cancelled,
}

pub type LabelingResult<T> = Result<T, LabelingError>;
