use crate::{env_list, env_or_default, ConfigError, FromEnv};
use std::net::Ipv4Addr;

/// Origins the search API accepts browser requests from by default
/// (the local static dashboard).
pub const DEFAULT_CORS_ORIGINS: &str = "http://127.0.0.1:5500,http://localhost:5500";

/// Server configuration for the HTTP search API
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            cors_origins: Vec::new(),
        }
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromEnv for ServerConfig {
    /// Reads from environment variables with sensible defaults:
    /// - HOST: defaults to 0.0.0.0
    /// - PORT: defaults to 8000
    /// - CORS_ORIGINS: comma-separated, defaults to the local dashboard origins
    fn from_env() -> Result<Self, ConfigError> {
        let host = env_or_default("HOST", &Ipv4Addr::UNSPECIFIED.to_string());
        let port = env_or_default("PORT", "8000").parse().map_err(|e| {
            ConfigError::ParseError {
                key: "PORT".to_string(),
                details: format!("{}", e),
            }
        })?;
        let cors_origins = env_list("CORS_ORIGINS", DEFAULT_CORS_ORIGINS);

        Ok(Self {
            host,
            port,
            cors_origins,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED.to_string(),
            port: 8000,
            cors_origins: DEFAULT_CORS_ORIGINS.split(',').map(String::from).collect(),
        }
    }
}
