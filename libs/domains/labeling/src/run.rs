//! Labeling run orchestration
//!
//! Preflight the search port, optionally seed the reducer from the corpus,
//! fan out one query per taxonomy term, then dedup and report.

use std::sync::Arc;

use domain_vector::MessagePayload;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::config::LabelingConfig;
use crate::error::{LabelingError, LabelingResult};
use crate::export::{LabelingReport, dedup_by_identity};
use crate::models::LabeledRecord;
use crate::port::SearchPort;
use crate::reducer::BestLabelReducer;
use crate::scheduler::{FanOutScheduler, ProgressCallback};
use crate::taxonomy::Taxonomy;

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct LabelingOutcome {
    /// One row per labeled identity, in first-seen order
    pub records: Vec<LabeledRecord>,
    pub report: LabelingReport,
}

pub struct Labeler {
    port: Arc<dyn SearchPort>,
    config: LabelingConfig,
    corpus: Option<Vec<MessagePayload>>,
    shutdown: Option<watch::Receiver<bool>>,
    on_progress: Option<ProgressCallback>,
}

impl Labeler {
    pub fn new(port: Arc<dyn SearchPort>, config: LabelingConfig) -> Self {
        Self {
            port,
            config,
            corpus: None,
            shutdown: None,
            on_progress: None,
        }
    }

    /// Source messages used to seed the reducer when seeding is enabled.
    pub fn with_corpus(mut self, corpus: Vec<MessagePayload>) -> Self {
        self.corpus = Some(corpus);
        self
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn config(&self) -> &LabelingConfig {
        &self.config
    }

    /// Label every message reachable through the taxonomy's terms.
    ///
    /// Per-term failures are absorbed. The run fails as a whole only when it
    /// is cancelled or, with `fail_on_total_outage`, when the service cannot
    /// be reached at all.
    #[instrument(skip_all, fields(terms = taxonomy.len()))]
    pub async fn run(&self, taxonomy: Arc<Taxonomy>) -> LabelingResult<LabelingOutcome> {
        self.preflight().await?;

        let mut reducer = BestLabelReducer::new(Arc::clone(&taxonomy));
        match (&self.corpus, self.config.seed_from_corpus) {
            (Some(corpus), true) => {
                reducer.seed(corpus);
                info!(messages = reducer.len(), "Seeded reducer from corpus");
            }
            (None, true) => info!("No corpus available, unlabeled messages will not be counted"),
            _ => {}
        }

        let mut scheduler = FanOutScheduler::new(Arc::clone(&self.port), self.config.fan_out.clone());
        if let Some(shutdown) = &self.shutdown {
            scheduler = scheduler.with_shutdown(shutdown.clone());
        }
        if let Some(callback) = &self.on_progress {
            scheduler = scheduler.with_progress_callback(Arc::clone(callback));
        }

        let summary = scheduler
            .run(taxonomy.terms(), |term, matches| reducer.apply(term, matches))
            .await?;

        if summary.is_total_outage() {
            if self.config.fail_on_total_outage {
                return Err(LabelingError::ServiceUnavailable(format!(
                    "all {} term queries failed because the search service was unavailable",
                    summary.terms_total
                )));
            }
            warn!(terms = summary.terms_total, "Every term query failed, output will be empty");
        }

        let labeled = reducer.labeled_count();
        let unlabeled = reducer.unlabeled_count();
        let payload_conflicts = reducer.conflicts();
        let records = dedup_by_identity(reducer.into_records());

        let report = LabelingReport {
            terms_total: summary.terms_total,
            terms_failed: summary.terms_failed,
            failed_terms: summary.failed_terms,
            total_matches: summary.total_matches,
            labeled,
            unlabeled,
            payload_conflicts,
            ..LabelingReport::default()
        }
        .with_counts(&records);

        info!(
            total_matches = report.total_matches,
            labeled = report.labeled,
            unlabeled = report.unlabeled,
            terms_failed = report.terms_failed,
            "Labeling run finished"
        );

        Ok(LabelingOutcome { records, report })
    }

    async fn preflight(&self) -> LabelingResult<()> {
        match self.port.health_check().await {
            Ok(()) => Ok(()),
            Err(e) if self.config.fail_on_total_outage => {
                Err(LabelingError::ServiceUnavailable(e.to_string()))
            }
            Err(e) => {
                warn!(error = %e, "Search service health check failed, continuing");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FanOutConfig;
    use crate::error::SearchPortError;
    use crate::models::SearchMatch;
    use crate::port::MockSearchPort;

    fn taxonomy() -> Arc<Taxonomy> {
        Arc::new(Taxonomy::from_pairs([
            ("Hazards", vec!["flood"]),
            ("Other", vec!["earthquake"]),
        ]))
    }

    #[tokio::test]
    async fn test_failed_preflight_is_fatal() {
        let mut port = MockSearchPort::new();
        port.expect_health_check()
            .returning(|| Err(SearchPortError::ServiceUnavailable("refused".to_string())));
        port.expect_search().never();

        let labeler = Labeler::new(Arc::new(port), LabelingConfig::default());
        let err = labeler.run(taxonomy()).await.unwrap_err();
        assert!(matches!(err, LabelingError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_failed_preflight_tolerated_when_configured() {
        let mut port = MockSearchPort::new();
        port.expect_health_check()
            .returning(|| Err(SearchPortError::ServiceUnavailable("refused".to_string())));
        port.expect_search()
            .returning(|_, _| Ok(vec![SearchMatch::new("t1", "A", "loc", "msg", 0.4)]));

        let labeler = Labeler::new(
            Arc::new(port),
            LabelingConfig::default().with_fail_on_total_outage(false),
        );
        let outcome = labeler.run(taxonomy()).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
    }

    #[tokio::test]
    async fn test_report_counts_seeded_unlabeled() {
        let mut port = MockSearchPort::new();
        port.expect_health_check().returning(|| Ok(()));
        port.expect_search().returning(|query, _| {
            Ok(match query {
                "flood" => vec![SearchMatch::new("t1", "A", "loc", "msg", 0.9)],
                _ => vec![],
            })
        });

        let corpus = vec![
            MessagePayload::new("t1", "loc", "A", "msg"),
            MessagePayload::new("t2", "loc", "B", "other"),
        ];
        let labeler = Labeler::new(
            Arc::new(port),
            LabelingConfig::new(FanOutConfig::default()),
        )
        .with_corpus(corpus);

        let outcome = labeler.run(taxonomy()).await.unwrap();
        assert_eq!(outcome.report.labeled, 1);
        assert_eq!(outcome.report.unlabeled, 1);
        assert_eq!(outcome.report.total_matches, 1);
        assert_eq!(outcome.report.label_counts, vec![("flood".to_string(), 1)]);
        assert_eq!(outcome.records[0].main_category, "Hazards");
    }

    #[tokio::test]
    async fn test_seeding_disabled_skips_corpus() {
        let mut port = MockSearchPort::new();
        port.expect_health_check().returning(|| Ok(()));
        port.expect_search().returning(|_, _| Ok(vec![]));

        let labeler = Labeler::new(
            Arc::new(port),
            LabelingConfig::default().with_seed_from_corpus(false),
        )
        .with_corpus(vec![MessagePayload::new("t1", "loc", "A", "msg")]);

        let outcome = labeler.run(taxonomy()).await.unwrap();
        assert_eq!(outcome.report.unlabeled, 0);
        assert!(outcome.records.is_empty());
    }
}
