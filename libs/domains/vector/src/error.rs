use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Detail returned to HTTP clients when Qdrant cannot be reached.
pub const UNAVAILABLE_DETAIL: &str =
    "Vector search service is currently unavailable. Please try again later.";

#[derive(Debug, Error)]
pub enum VectorError {
    /// The vector store (or the embedding endpoint in front of it) could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Qdrant error: {0}")]
    Qdrant(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    /// A stored point or an upstream response could not be decoded.
    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type VectorResult<T> = Result<T, VectorError>;

impl VectorError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, VectorError::Unavailable(_))
    }
}

impl From<qdrant_client::QdrantError> for VectorError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        match &err {
            qdrant_client::QdrantError::ResponseError { status } => match status.code() {
                tonic::Code::Unavailable
                | tonic::Code::DeadlineExceeded
                | tonic::Code::Cancelled
                | tonic::Code::ResourceExhausted => VectorError::Unavailable(format!(
                    "Qdrant search operation failed: {}",
                    status.message()
                )),
                _ => VectorError::Qdrant(err.to_string()),
            },
            _ => VectorError::Qdrant(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for VectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            VectorError::Unavailable(format!("Embedding endpoint unreachable: {}", err))
        } else if err.is_decode() {
            VectorError::Malformed(format!("Embedding response: {}", err))
        } else {
            VectorError::Embedding(err.to_string())
        }
    }
}

impl From<serde_json::Error> for VectorError {
    fn from(err: serde_json::Error) -> Self {
        VectorError::Malformed(format!("JSON error: {}", err))
    }
}

impl IntoResponse for VectorError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            VectorError::Unavailable(msg) => {
                tracing::warn!(error = %msg, "Vector search unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_DETAIL.to_string())
            }
            VectorError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            other => {
                tracing::error!(error = %other, "Search request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Search error: {}", other),
                )
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
