//! Error types for Genrelay
//!
//! Everything here describes a failure that happens before the first byte
//! of a relayed stream is sent. Faults after that point can only end the
//! stream and are handled inside the relay stage.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        field: Option<&'static str>,
        message: String,
    },

    #[error("Model '{model}' not found in {source_name}")]
    ModelNotFound { model: String, source_name: String },

    #[error("Failed to connect to the AI provider at {url}. Error: {message}")]
    UpstreamUnreachable { url: String, message: String },

    #[error("AI provider at {url} rejected the request with status {status}")]
    UpstreamRejected { url: String, status: u16, body: Value },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: Some(field),
            message: message.into(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, details) = match &self {
            AppError::Validation { field, .. } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                field.map(|f| json!({ "field": f })),
            ),
            AppError::ModelNotFound { model, .. } => (
                StatusCode::NOT_FOUND,
                "MODEL_NOT_FOUND",
                Some(json!({ "model": model })),
            ),
            AppError::UpstreamUnreachable { url, .. } => (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_UNREACHABLE",
                Some(json!({ "upstream_url": url })),
            ),
            AppError::UpstreamRejected { url, status, body } => (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_REJECTED",
                Some(json!({
                    "upstream_url": url,
                    "upstream_status": status,
                    "upstream_error": body,
                })),
            ),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None),
        };

        let message = match &self {
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
