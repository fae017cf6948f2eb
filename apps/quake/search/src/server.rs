//! HTTP server initialization and lifecycle
//!
//! - Tracing and color-eyre setup
//! - Qdrant connection
//! - Embedding provider setup
//! - Router, CORS and graceful shutdown

use std::sync::Arc;

use core_config::server::ServerConfig;
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv, env_or_default};
use domain_vector::{
    EmbeddingModel, MessageSearchService, OpenAIProvider, QdrantConfig, QdrantRepository,
    models::DEFAULT_EMBEDDING_MODEL,
};
use eyre::{Result, WrapErr};
use tracing::{info, warn};

/// Run the search API
///
/// 1. Sets up error reports and structured logging
/// 2. Connects to Qdrant and checks it is reachable
/// 3. Configures the query embedding provider
/// 4. Serves the router until SIGINT/SIGTERM
///
/// # Errors
///
/// Returns an error if configuration is invalid, the Qdrant client cannot be
/// built, or the listener fails to bind.
pub async fn run() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let qdrant_config = QdrantConfig::from_env().wrap_err("Failed to load Qdrant configuration")?;
    let score_threshold = qdrant_config.score_threshold;

    info!(
        url = %qdrant_config.url,
        collection = %qdrant_config.collection,
        "Connecting to Qdrant"
    );
    let repository = QdrantRepository::new(qdrant_config)
        .await
        .wrap_err("Failed to create Qdrant client")?;

    let provider = OpenAIProvider::from_env().wrap_err("Failed to load embedding configuration")?;
    let model = EmbeddingModel::new(env_or_default("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL));
    info!(model = %model.model_name(), "Embedding provider configured");

    let service = MessageSearchService::new(repository, Arc::new(provider))
        .with_model(model)
        .with_score_threshold(score_threshold);

    // Qdrant may come up after us; searches report 503 until it does.
    match service.health_check().await {
        Ok(()) => info!("Connected to Qdrant successfully"),
        Err(e) => warn!(error = %e, "Qdrant not reachable yet"),
    }

    let server_config = ServerConfig::from_env().wrap_err("Failed to load server configuration")?;
    let router = axum_helpers::with_common_layers(domain_vector::router(service), &server_config)
        .wrap_err("Failed to configure HTTP middleware")?;

    axum_helpers::serve(router, &server_config)
        .await
        .wrap_err("HTTP server failed")?;

    info!("Search API stopped");
    Ok(())
}
