//! Inbound request parsing and validation
//!
//! Runs before any directory lookup or upstream call.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

/// One chat message. Its contents are forwarded to the upstream untouched.
pub type Message = Map<String, Value>;

/// Body of `POST /api/generate` as received
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub model_name: String,
    pub messages: Vec<Message>,
}

impl GenerationRequest {
    /// Parse a raw request body.
    pub fn from_slice(body: &[u8]) -> AppResult<Self> {
        serde_json::from_slice(body).map_err(|e| AppError::Validation {
            field: None,
            message: format!("Invalid request body: {}", e),
        })
    }

    pub fn validate(self) -> AppResult<ValidatedRequest> {
        let model_name = match self.model_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(AppError::validation("modelName", "modelName is required")),
        };

        let messages = self
            .messages
            .ok_or_else(|| AppError::validation("messages", "messages is required"))?;

        Ok(ValidatedRequest {
            model_name,
            messages,
        })
    }
}

/// Parse and validate in one step.
pub fn parse_request(body: &[u8]) -> AppResult<ValidatedRequest> {
    GenerationRequest::from_slice(body)?.validate()
}
