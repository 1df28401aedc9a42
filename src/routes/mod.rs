//! HTTP routes for Genrelay
//!
//! This module defines all HTTP endpoints exposed by the relay.

pub mod generate;
pub mod root;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root::root))
        .route("/api/generate", post(generate::generate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
