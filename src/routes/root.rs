//! Liveness endpoint
//!
//! `GET /` answers as long as the process is serving requests.

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Static liveness payload
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
}

pub async fn root() -> (StatusCode, Json<RootResponse>) {
    (
        StatusCode::OK,
        Json(RootResponse {
            message: "Genrelay is running.".to_string(),
        }),
    )
}
