//! Configuration management for Genrelay
//!
//! Configuration is loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::relay::RelayMode;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Path to the provider directory file
    pub provider_file: PathBuf,

    /// How upstream streams are forwarded to callers
    pub relay_mode: RelayMode,

    /// Overall timeout for one upstream call, body included
    pub upstream_timeout: Duration,

    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: lookup("RELAY_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: lookup("RELAY_PORT")
                .unwrap_or_else(|| "5000".to_string())
                .parse()
                .context("Invalid RELAY_PORT")?,

            provider_file: lookup("RELAY_PROVIDER_FILE")
                .unwrap_or_else(|| "provider.json".to_string())
                .into(),

            relay_mode: lookup("RELAY_MODE")
                .unwrap_or_else(|| "passthrough".to_string())
                .parse()
                .context("Invalid RELAY_MODE")?,

            upstream_timeout: Duration::from_secs(
                lookup("RELAY_UPSTREAM_TIMEOUT_SECS")
                    .unwrap_or_else(|| "300".to_string())
                    .parse()
                    .context("Invalid RELAY_UPSTREAM_TIMEOUT_SECS")?,
            ),

            log_json: lookup("RELAY_LOG_JSON")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}
