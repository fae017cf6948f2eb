//! Labeling run metrics
//!
//! Recorded through the `metrics` facade; with no recorder installed every
//! call is a no-op.

use metrics::{counter, gauge};

/// Outcome of one term query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermStatus {
    Success,
    Failed,
}

impl TermStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TermStatus::Success => "success",
            TermStatus::Failed => "failed",
        }
    }
}

pub fn record_term_completed(status: TermStatus) {
    counter!("labeler_terms_completed_total", "status" => status.as_str()).increment(1);
}

pub fn record_matches(count: usize) {
    counter!("labeler_matches_total").increment(count as u64);
}

pub fn record_retry() {
    counter!("labeler_term_retries_total").increment(1);
}

pub fn set_terms_in_flight(count: usize) {
    gauge!("labeler_terms_in_flight").set(count as f64);
}

/// Identity seen again with a different location or message
pub fn record_payload_conflict() {
    counter!("labeler_payload_conflicts_total").increment(1);
}
