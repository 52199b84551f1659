//! Error types for the mail summarizer.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Text extraction errors.
///
/// Only whole-document failures surface as this type; a page that fails to
/// decode is skipped by the extractor.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Failed to open document {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Failed to extract page {page}: {reason}")]
    Page { page: u32, reason: String },

    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outbound mail errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Transport {name} is misconfigured: {reason}")]
    Config { name: String, reason: String },

    #[error("Failed to build message for {to}: {reason}")]
    Build { to: String, reason: String },

    #[error("Transport {name} failed to send: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Inbound webhook errors.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Invalid multipart form: {0}")]
    InvalidForm(String),

    #[error("Failed to save attachment {name}: {reason}")]
    Attachment { name: String, reason: String },
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::InvalidForm(_) => StatusCode::BAD_REQUEST,
            WebhookError::Attachment { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(status = %status, error = %self, "Rejecting inbound webhook");
        (
            status,
            Json(serde_json::json!({
                "status": "error",
                "error": self.to_string(),
            })),
        )
            .into_response()
    }
}
