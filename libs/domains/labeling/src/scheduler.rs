//! Fan-out query scheduler
//!
//! Runs one search per taxonomy term with a bounded number in flight and hands
//! each `(term, matches)` pair to the caller as soon as it completes. Term
//! queries are spawned onto a `JoinSet`, a semaphore caps how many are talking
//! to the port at once, and the `join_next_with_id` loop is the single
//! consumer that feeds the reducer.
//!
//! A failing term never aborts the others. It is logged, counted, and treated
//! as zero matches. Retries (for unavailable answers only) and the per-attempt
//! timeout live here, not in the port.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use tokio::sync::{Semaphore, watch};
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info, instrument, warn};

use crate::config::FanOutConfig;
use crate::error::{LabelingError, LabelingResult, SearchPortError};
use crate::metrics::{self, TermStatus};
use crate::models::SearchMatch;
use crate::port::SearchPort;

/// Live counters for a fan-out, readable from another task while it runs.
#[derive(Debug, Default)]
pub struct FanOutProgress {
    total: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    matches: AtomicUsize,
}

/// Point-in-time copy of [`FanOutProgress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub total: usize,
    /// Terms finished, successful or not
    pub completed: usize,
    pub failed: usize,
    pub matches: usize,
}

impl FanOutProgress {
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
        }
    }

    fn reset(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.matches.store(0, Ordering::Relaxed);
    }
}

/// Emitted once per finished term
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub term: String,
    pub status: TermStatus,
    pub matches: usize,
    pub progress: ProgressSnapshot,
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// What a finished fan-out did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutSummary {
    pub terms_total: usize,
    pub terms_succeeded: usize,
    pub terms_failed: usize,
    /// Failures whose last attempt was a service-unavailable answer
    pub unavailable_failures: usize,
    pub total_matches: usize,
    pub failed_terms: Vec<String>,
}

impl FanOutSummary {
    /// True when there was at least one term and every one of them failed
    /// because the service could not be reached.
    pub fn is_total_outage(&self) -> bool {
        self.terms_total > 0 && self.unavailable_failures == self.terms_total
    }
}

struct TermOutcome {
    term: String,
    attempts: u32,
    result: Result<Vec<SearchMatch>, SearchPortError>,
}

/// Keeps the in-flight gauge honest even if a query task unwinds.
struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_terms_in_flight(current);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let current = self.0.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_terms_in_flight(current);
    }
}

pub struct FanOutScheduler {
    port: Arc<dyn SearchPort>,
    config: FanOutConfig,
    progress: Arc<FanOutProgress>,
    on_progress: Option<ProgressCallback>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl FanOutScheduler {
    pub fn new(port: Arc<dyn SearchPort>, config: FanOutConfig) -> Self {
        Self {
            port,
            config,
            progress: Arc::new(FanOutProgress::default()),
            on_progress: None,
            shutdown: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Abort the fan-out once the receiver observes `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn config(&self) -> &FanOutConfig {
        &self.config
    }

    pub fn progress(&self) -> Arc<FanOutProgress> {
        Arc::clone(&self.progress)
    }

    /// Query every term and deliver results to `on_result` in completion order.
    ///
    /// Returns once every term has either produced matches or been recorded
    /// as failed. Only cancellation makes this return an error; in that case
    /// in-flight queries are aborted and the caller should drop whatever
    /// `on_result` accumulated.
    #[instrument(skip_all, fields(terms = terms.len(), max_concurrent = self.config.max_concurrent_queries))]
    pub async fn run<F>(&self, terms: &[String], mut on_result: F) -> LabelingResult<FanOutSummary>
    where
        F: FnMut(&str, &[SearchMatch]),
    {
        let mut shutdown = self.shutdown.clone();
        if shutdown.as_ref().is_some_and(|rx| *rx.borrow()) {
            info!("Shutdown requested before fan-out started");
            return Err(LabelingError::Cancelled);
        }

        self.progress.reset(terms.len());
        let mut summary = FanOutSummary {
            terms_total: terms.len(),
            ..FanOutSummary::default()
        };

        // A struct-literal config can carry 0, which would never grant a permit.
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_queries.max(1)));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut join_set: JoinSet<TermOutcome> = JoinSet::new();
        let mut pending: HashMap<task::Id, String> = HashMap::with_capacity(terms.len());

        for term in terms {
            let port = Arc::clone(&self.port);
            let semaphore = Arc::clone(&semaphore);
            let in_flight = Arc::clone(&in_flight);
            let config = self.config.clone();
            let term = term.clone();
            let task_term = term.clone();

            let handle = join_set.spawn(async move {
                let query = AssertUnwindSafe(async {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return (
                            0,
                            Err(SearchPortError::Rejected("scheduler closed".to_string())),
                        );
                    };
                    let _guard = InFlightGuard::enter(&in_flight);
                    query_with_retry(port.as_ref(), &task_term, &config).await
                });

                let (attempts, result) = query.catch_unwind().await.unwrap_or_else(|_| {
                    (1, Err(SearchPortError::Rejected("search task panicked".to_string())))
                });

                TermOutcome {
                    term: task_term,
                    attempts,
                    result,
                }
            });
            pending.insert(handle.id(), term);
        }

        loop {
            let next = match shutdown.as_mut() {
                Some(rx) => tokio::select! {
                    biased;
                    _ = shutdown_requested(rx) => {
                        warn!(
                            pending = join_set.len(),
                            "Shutdown requested, aborting in-flight searches"
                        );
                        join_set.abort_all();
                        return Err(LabelingError::Cancelled);
                    }
                    next = join_set.join_next_with_id() => next,
                },
                None => join_set.join_next_with_id().await,
            };

            let Some(joined) = next else {
                break;
            };

            let outcome = match joined {
                Ok((id, outcome)) => {
                    pending.remove(&id);
                    outcome
                }
                Err(e) => {
                    let term = pending.remove(&e.id()).unwrap_or_default();
                    error!(term = %term, error = %e, "Search task ended without an outcome");
                    TermOutcome {
                        term,
                        attempts: 1,
                        result: Err(SearchPortError::Rejected(format!("search task failed: {e}"))),
                    }
                }
            };
            self.record(outcome, &mut summary, &mut on_result);
        }

        info!(
            terms = summary.terms_total,
            succeeded = summary.terms_succeeded,
            failed = summary.terms_failed,
            total_matches = summary.total_matches,
            "Fan-out complete"
        );

        Ok(summary)
    }

    fn record<F>(&self, outcome: TermOutcome, summary: &mut FanOutSummary, on_result: &mut F)
    where
        F: FnMut(&str, &[SearchMatch]),
    {
        let TermOutcome {
            term,
            attempts,
            result,
        } = outcome;

        let (status, match_count) = match result {
            Ok(matches) => {
                debug!(term = %term, matches = matches.len(), attempts, "Term completed");
                summary.terms_succeeded += 1;
                summary.total_matches += matches.len();
                self.progress
                    .matches
                    .fetch_add(matches.len(), Ordering::Relaxed);
                metrics::record_matches(matches.len());
                on_result(&term, &matches);
                (TermStatus::Success, matches.len())
            }
            Err(e) => {
                warn!(
                    term = %term,
                    attempts,
                    error = %e,
                    "Term query failed, treating as zero matches"
                );
                summary.terms_failed += 1;
                if e.is_unavailable() {
                    summary.unavailable_failures += 1;
                }
                summary.failed_terms.push(term.clone());
                self.progress.failed.fetch_add(1, Ordering::Relaxed);
                (TermStatus::Failed, 0)
            }
        };

        self.progress.completed.fetch_add(1, Ordering::Relaxed);
        metrics::record_term_completed(status);

        if let Some(callback) = &self.on_progress {
            callback(&ProgressEvent {
                term,
                status,
                matches: match_count,
                progress: self.progress.snapshot(),
            });
        }
    }
}

/// Resolves once the flag reads `true`. A dropped sender can no longer
/// cancel, so that case never resolves.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn query_with_retry(
    port: &dyn SearchPort,
    term: &str,
    config: &FanOutConfig,
) -> (u32, Result<Vec<SearchMatch>, SearchPortError>) {
    let mut attempt = 0;

    loop {
        let result =
            match tokio::time::timeout(config.query_timeout(), port.search(term, config.query_limit))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(SearchPortError::ServiceUnavailable(format!(
                    "query timed out after {}s",
                    config.query_timeout_secs
                ))),
            };

        match result {
            Err(e) if e.is_unavailable() && attempt < config.max_retries => {
                let delay = config.backoff_for(attempt);
                attempt += 1;
                metrics::record_retry();
                debug!(
                    term = %term,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Search unavailable, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            other => return (attempt + 1, other),
        }
    }
}
