//! # Axum Helpers
//!
//! Server bootstrap shared by the workspace binaries.
//!
//! - **[`server`]**: CORS and tracing layers, serving with graceful shutdown
//! - **[`shutdown`]**: SIGINT/SIGTERM handling, as a future or a watch flag
//!
//! ```ignore
//! use axum_helpers::{serve, with_common_layers};
//! use core_config::{FromEnv, server::ServerConfig};
//!
//! let config = ServerConfig::from_env()?;
//! let router = with_common_layers(domain_vector::router(service), &config)?;
//! serve(router, &config).await?;
//! ```

pub mod server;
pub mod shutdown;

pub use server::{cors_layer, serve, with_common_layers};
pub use shutdown::{shutdown_signal, shutdown_watch};
