//! HTTP server bootstrap
//!
//! Binds the configured address, layers request tracing and CORS over a
//! router, and serves until a shutdown signal arrives.

use std::io;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use core_config::server::ServerConfig;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};

use crate::shutdown::shutdown_signal;

/// CORS layer allowing read-only requests from the configured origins.
///
/// An empty origin list disables cross-origin access.
pub fn cors_layer(origins: &[String]) -> io::Result<CorsLayer> {
    let allowed_origins = origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid CORS origin: {}", e),
            )
        })?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600)))
}

/// Wrap `router` with request tracing and CORS for `config`.
pub fn with_common_layers(router: Router, config: &ServerConfig) -> io::Result<Router> {
    info!(origins = ?config.cors_origins, "CORS configured");

    Ok(router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&config.cors_origins)?))
}

/// Serve `router` on the configured address until SIGINT/SIGTERM.
pub async fn serve(router: Router, config: &ServerConfig) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.address()).await?;

    info!("Server starting on {}", listener.local_addr()?);
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .inspect_err(|e| {
            tracing::error!("Server encountered an error: {:?}", e);
        })?;

    Ok(())
}
