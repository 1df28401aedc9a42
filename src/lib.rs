//! Genrelay - minimal streaming relay for AI chat completions
//!
//! Accepts `POST /api/generate`, resolves the requested model against a
//! provider directory loaded at startup, and streams the upstream
//! OpenAI-compatible completion back to the caller, either verbatim or as
//! extracted delta text.

pub mod config;
pub mod error;
pub mod providers;
pub mod proxy;
pub mod relay;
pub mod request;
pub mod routes;
pub mod streaming;

use std::sync::Arc;

use anyhow::{Context, Result};

pub use crate::config::Config;
pub use crate::error::{AppError, AppResult};
pub use crate::providers::{ProviderDirectory, ResolvedTarget};
pub use crate::proxy::UpstreamClient;
pub use crate::relay::RelayMode;

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    /// Read-only after startup, so shared without locking
    pub directory: Arc<ProviderDirectory>,
    /// Client for upstream providers
    pub upstream: UpstreamClient,
}

impl AppState {
    /// Create the application state, loading the provider directory.
    ///
    /// A missing or unparsable provider file is returned as an error and
    /// must stop the process before it binds.
    pub fn new(config: Config) -> Result<Self> {
        let directory = ProviderDirectory::load(&config.provider_file)
            .context("Failed to load provider directory")?;
        Self::with_directory(config, directory)
    }

    /// Create the application state around an already built directory.
    pub fn with_directory(config: Config, directory: ProviderDirectory) -> Result<Self> {
        let upstream = UpstreamClient::new(config.upstream_timeout)
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            config,
            directory: Arc::new(directory),
            upstream,
        })
    }
}
