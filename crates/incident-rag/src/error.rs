//! Error types for the incident retrieval engine

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
///
/// Refusals are *not* errors: a refused query is a successful `RagResponse`
/// with `rag_strategy = refusal`. Only genuine faults travel this enum.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or oversize request input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Incident failed schema validation at ingest
    #[error("Schema violation for '{id}': {message}")]
    Schema { id: String, message: String },

    /// Incident id already admitted
    #[error("Duplicate incident id: {0}")]
    DuplicateId(String),

    /// Incident not found
    #[error("Incident not found: {0}")]
    NotFound(String),

    /// Embedding provider failed after retries
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Vector index error
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Generative provider error
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Provider rate limit exhausted (backlog full or retries spent)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transient remote failure, retryable
    #[error("Transient remote failure: {0}")]
    Transient(String),

    /// Request deadline exceeded
    #[error("Deadline exceeded after {0}ms")]
    DeadlineExceeded(u64),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parse error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable kind code carried in every error payload
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::InvalidInput(_) => "invalid_input",
            Error::Schema { .. } => "schema_violation",
            Error::DuplicateId(_) => "duplicate_id",
            Error::NotFound(_) => "not_found",
            Error::EmbeddingUnavailable(_) => "embedding_unavailable",
            Error::VectorIndex(_) => "vector_index",
            Error::Generation(_) => "generation",
            Error::RateLimited(_) => "rate_limited",
            Error::Transient(_) => "transient",
            Error::DeadlineExceeded(_) => "deadline_exceeded",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Csv(_) => "csv",
            Error::Http(_) => "http",
            Error::Internal(_) => "internal",
        }
    }

    /// Whether a retry with backoff may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::RateLimited(_))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidInput(_) | Error::Csv(_) => StatusCode::BAD_REQUEST,
            Error::Schema { .. } | Error::DuplicateId(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let correlation_id = Uuid::new_v4();
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(correlation_id = %correlation_id, error = %self, kind = self.kind(), "request failed");
        } else {
            tracing::warn!(correlation_id = %correlation_id, error = %self, kind = self.kind(), "request rejected");
        }

        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
                "correlation_id": correlation_id,
            }
        }));

        (status, body).into_response()
    }
}
