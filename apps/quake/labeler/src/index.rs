use std::sync::Arc;

use core_config::{FromEnv, env_or_default};
use domain_vector::models::DEFAULT_EMBEDDING_MODEL;
use domain_vector::{
    EmbeddingModel, IndexSummary, MessageIndexer, MessagePayload, OpenAIProvider, QdrantConfig,
    QdrantRepository,
};
use eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::IndexArgs;
use crate::label::load_corpus;

fn progress_bar(messages: usize) -> ProgressBar {
    let bar = ProgressBar::new(messages as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos}/{len} messages",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=>-");
    bar.set_style(style);
    bar
}

/// Corpus rows to index, honouring `--limit`.
fn select(mut corpus: Vec<MessagePayload>, limit: Option<usize>) -> Vec<MessagePayload> {
    if let Some(limit) = limit {
        corpus.truncate(limit);
    }
    corpus
}

/// Embed a corpus CSV and write it into the configured Qdrant collection.
pub async fn run(args: IndexArgs) -> Result<()> {
    let corpus = select(load_corpus(&args.corpus)?, args.limit);
    info!(messages = corpus.len(), corpus = %args.corpus.display(), "Loaded corpus");

    let qdrant_config = QdrantConfig::from_env().wrap_err("Failed to load Qdrant configuration")?;
    info!(url = %qdrant_config.url, collection = %qdrant_config.collection, "Indexing into Qdrant");

    let repository = QdrantRepository::new(qdrant_config)
        .await
        .wrap_err("Failed to create Qdrant client")?;
    let provider = OpenAIProvider::from_env().wrap_err("Failed to load embedding configuration")?;
    let model = EmbeddingModel::new(env_or_default("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL));

    let indexer = MessageIndexer::new(repository, Arc::new(provider))
        .with_model(model)
        .with_batch_size(args.batch_size)
        .with_dimension(args.dimension);

    let bar = progress_bar(corpus.len());
    let result = indexer
        .index(&corpus, |done| bar.set_position(done as u64))
        .await;
    match &result {
        Ok(_) => bar.finish(),
        Err(_) => bar.abandon(),
    }

    let IndexSummary {
        created_collection,
        batches,
        indexed,
    } = result.wrap_err("Indexing failed")?;
    info!(indexed, batches, created_collection, "Indexed corpus");
    Ok(())
}
