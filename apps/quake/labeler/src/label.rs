use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use core_config::{FromEnv, env_or_default};
use domain_labeling::scheduler::ProgressCallback;
use domain_labeling::{
    DirectSearchPort, HttpSearchPort, Labeler, LabelingConfig, LabelingOutcome, ProgressEvent,
    SearchPort, Taxonomy, read_corpus, write_csv,
};
use domain_vector::models::DEFAULT_EMBEDDING_MODEL;
use domain_vector::{
    EmbeddingModel, MessagePayload, MessageSearchService, OpenAIProvider, QdrantConfig,
    QdrantRepository,
};
use eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::RunArgs;
use crate::output::write_atomically;

/// Apply command-line overrides on top of the environment configuration.
fn labeling_config(args: &RunArgs) -> Result<LabelingConfig> {
    let mut config = LabelingConfig::from_env().wrap_err("Failed to load labeler configuration")?;

    if let Some(n) = args.concurrency {
        config.fan_out = config.fan_out.with_max_concurrent_queries(n);
    }
    if let Some(limit) = args.limit {
        config.fan_out = config.fan_out.with_query_limit(limit);
    }
    if let Some(retries) = args.max_retries {
        config.fan_out = config.fan_out.with_max_retries(retries);
    }
    if let Some(secs) = args.timeout_secs {
        config.fan_out = config.fan_out.with_query_timeout_secs(secs);
    }
    if args.allow_partial {
        config.fail_on_total_outage = false;
    }
    if args.no_corpus_seed {
        config.seed_from_corpus = false;
    }

    Ok(config)
}

fn progress_bar(terms: usize) -> ProgressBar {
    let bar = ProgressBar::new(terms as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} terms {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=>-");
    bar.set_style(style);
    bar
}

/// Moves the bar to the completed-term count and logs each term at debug.
fn progress_reporter(bar: ProgressBar) -> ProgressCallback {
    Arc::new(move |event: &ProgressEvent| {
        let progress = event.progress;
        bar.set_length(progress.total as u64);
        bar.set_position(progress.completed as u64);
        bar.set_message(format!(
            "{} matches, {} failed",
            progress.matches, progress.failed
        ));
        debug!(term = %event.term, status = event.status.as_str(), matches = event.matches, "Term done");
    })
}

type PortAndCorpus = (Arc<dyn SearchPort>, Option<Vec<MessagePayload>>);

async fn direct_port(seed: bool) -> Result<PortAndCorpus> {
    let qdrant_config = QdrantConfig::from_env().wrap_err("Failed to load Qdrant configuration")?;
    let score_threshold = qdrant_config.score_threshold;
    info!(url = %qdrant_config.url, collection = %qdrant_config.collection, "Searching Qdrant directly");

    let repository = QdrantRepository::new(qdrant_config)
        .await
        .wrap_err("Failed to create Qdrant client")?;
    let provider = OpenAIProvider::from_env().wrap_err("Failed to load embedding configuration")?;
    let model = EmbeddingModel::new(env_or_default("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL));

    let service = Arc::new(
        MessageSearchService::new(repository, Arc::new(provider))
            .with_model(model)
            .with_score_threshold(score_threshold),
    );

    let corpus = if seed {
        match service.corpus().await {
            Ok(corpus) => Some(corpus),
            Err(e) => {
                warn!(error = %e, "Failed to load corpus, unlabeled messages will not be counted");
                None
            }
        }
    } else {
        None
    };

    let port: Arc<dyn SearchPort> = Arc::new(DirectSearchPort::new(service));
    Ok((port, corpus))
}

fn http_port(args: &RunArgs, config: &LabelingConfig) -> Result<PortAndCorpus> {
    info!(url = %args.search_url, "Searching through the search API");
    let port: Arc<dyn SearchPort> = Arc::new(HttpSearchPort::new(
        args.search_url.clone(),
        Duration::from_secs(config.fan_out.query_timeout_secs),
    )?);

    let corpus = match (&args.corpus, config.seed_from_corpus) {
        (Some(path), true) => Some(load_corpus(path)?),
        _ => None,
    };

    Ok((port, corpus))
}

pub(crate) fn load_corpus(path: &Path) -> Result<Vec<MessagePayload>> {
    let file = File::open(path).wrap_err_with(|| format!("Failed to open corpus {}", path.display()))?;
    read_corpus(file).wrap_err_with(|| format!("Failed to read corpus {}", path.display()))
}

fn log_report(outcome: &LabelingOutcome) {
    let report = &outcome.report;
    info!(
        terms = report.terms_total,
        terms_failed = report.terms_failed,
        total_matches = report.total_matches,
        labeled = report.labeled,
        unlabeled = report.unlabeled,
        payload_conflicts = report.payload_conflicts,
        "Labeling summary"
    );
    if !report.failed_terms.is_empty() {
        warn!(terms = ?report.failed_terms, "Terms that returned no results because their query failed");
    }
    for (label, count) in &report.label_counts {
        info!(label = %label, count, "Label count");
    }
    for (main_category, count) in &report.main_category_counts {
        info!(main_category = %main_category, count, "Main category count");
    }
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = labeling_config(&args)?;

    let taxonomy = Taxonomy::load(&args.taxonomy)
        .wrap_err_with(|| format!("Failed to load taxonomy from {}", args.taxonomy.display()))?;
    info!(
        terms = taxonomy.len(),
        main_categories = taxonomy.main_categories().len(),
        "Loaded taxonomy"
    );

    let (port, corpus) = if args.direct {
        direct_port(config.seed_from_corpus).await?
    } else {
        http_port(&args, &config)?
    };

    let bar = progress_bar(taxonomy.len());
    let mut labeler = Labeler::new(port, config)
        .with_shutdown(axum_helpers::shutdown_watch())
        .with_progress_callback(progress_reporter(bar.clone()));
    if let Some(corpus) = corpus {
        labeler = labeler.with_corpus(corpus);
    }

    let outcome = labeler.run(Arc::new(taxonomy)).await;
    match &outcome {
        Ok(_) => bar.finish(),
        Err(_) => bar.abandon(),
    }
    let outcome = outcome.wrap_err("Labeling run failed, no output written")?;

    let written = write_atomically(&args.output, |writer| {
        Ok(write_csv(writer, &outcome.records, args.with_score)?)
    })?;
    info!(rows = written, output = %args.output.display(), "Wrote labeled messages");

    if let Some(path) = &args.report {
        write_atomically(path, |writer| Ok(serde_json::to_writer_pretty(writer, &outcome.report)?))?;
        info!(report = %path.display(), "Wrote run report");
    }

    log_report(&outcome);
    Ok(())
}
