//! Disaster-message labeling
//!
//! Classifies every indexed message against a taxonomy of category terms.
//! Each term is sent to the vector search service as a query; the scheduler
//! runs those queries concurrently and the reducer keeps, per message, the
//! term whose match scored highest.
//!
//! ```text
//! Taxonomy ──terms──▶ FanOutScheduler ──(term, matches)──▶ BestLabelReducer
//!                          │                                     │
//!                     SearchPort                         dedup + export
//!              (HTTP API or in-process)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_labeling::{HttpSearchPort, Labeler, LabelingConfig, Taxonomy};
//!
//! let port = HttpSearchPort::new("http://127.0.0.1:8000", Duration::from_secs(60))?;
//! let taxonomy = Arc::new(Taxonomy::load("data/categories.json")?);
//!
//! let outcome = Labeler::new(Arc::new(port), LabelingConfig::default())
//!     .run(taxonomy)
//!     .await?;
//! domain_labeling::write_csv(file, &outcome.records, false)?;
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod metrics;
pub mod models;
pub mod port;
pub mod reducer;
pub mod run;
pub mod scheduler;
pub mod taxonomy;

pub use config::{FanOutConfig, LabelingConfig};
pub use error::{ExportError, LabelingError, LabelingResult, SearchPortError, TaxonomyError};
pub use export::{
    LabelingReport, ScoreColumn, dedup_by_identity, read_corpus, read_csv, read_csv_with_layout,
    write_csv, write_csv_as,
};
pub use models::{LabeledMessage, LabeledRecord, MessageIdentity, SearchMatch, UNCATEGORIZED};
pub use port::{DirectSearchPort, HttpSearchPort, SearchPort};
pub use reducer::BestLabelReducer;
pub use run::{Labeler, LabelingOutcome};
pub use scheduler::{FanOutProgress, FanOutScheduler, FanOutSummary, ProgressEvent, ProgressSnapshot};
pub use taxonomy::Taxonomy;

#[cfg(test)]
pub use port::MockSearchPort;
