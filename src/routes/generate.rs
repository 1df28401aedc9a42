//! Generation endpoint
//!
//! `POST /api/generate` validates the request, resolves the model, opens the
//! upstream stream and relays it back. Every failure up to and including
//! opening the upstream maps to an error status; after that the response is
//! committed and only the body stream remains.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::Response,
};
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    relay::{self, RelayMode},
    request::parse_request,
    AppState,
};

pub async fn generate(State(state): State<Arc<AppState>>, body: Bytes) -> AppResult<Response> {
    let start_time = Instant::now();

    let request = parse_request(&body)?;

    let target = state
        .directory
        .resolve(&request.model_name)
        .ok_or_else(|| AppError::ModelNotFound {
            model: request.model_name.clone(),
            source_name: state.directory.source_name().to_string(),
        })?;

    info!(
        model = %request.model_name,
        upstream_model = %target.upstream_model,
        url = %target.upstream_url,
        messages = request.messages.len(),
        "Processing generation request"
    );

    let upstream = state
        .upstream
        .open_stream(&target, &request.messages)
        .await?;

    let mode = state.config.relay_mode;

    info!(
        model = %request.model_name,
        mode = %mode,
        ttfb_ms = %format!("{:.2}", start_time.elapsed().as_secs_f64() * 1000.0),
        "Relaying upstream stream"
    );

    streaming_response(mode, Body::from_stream(relay::relay(mode, upstream)))
}

fn streaming_response(mode: RelayMode, body: Body) -> AppResult<Response> {
    // Keep proxies such as nginx from buffering the stream in either mode
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mode.content_type())
        .header(header::CACHE_CONTROL, "no-cache")
        .header("X-Accel-Buffering", "no")
        .body(body)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build response: {}", e)))
}
