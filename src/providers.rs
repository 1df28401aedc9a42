//! Provider directory
//!
//! Maps the public model names callers ask for onto an upstream endpoint,
//! the model name that endpoint expects, and the credential to send. The
//! directory is read once at startup and never mutated afterwards.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Failure to build the directory. Always fatal at startup.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("provider file {path} could not be read: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("provider file {path} is not a valid provider list: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Public name to upstream name mapping
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ModelMapping {
    /// Name callers use in `modelName`
    #[serde(rename = "name")]
    pub public_name: String,
    /// Name sent to the upstream in the `model` field
    #[serde(rename = "apiName")]
    pub upstream_name: String,
}

/// One upstream provider record
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProviderEntry {
    /// Chat completions endpoint of the provider
    #[serde(rename = "url")]
    pub base_url: String,
    /// Bearer credential; absent means no authentication
    #[serde(rename = "apiKey", default)]
    pub credential: Option<String>,
    pub models: Vec<ModelMapping>,
}

/// Everything needed to issue one upstream call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub upstream_url: String,
    pub upstream_model: String,
    pub credential: String,
}

/// Immutable, ordered provider table
#[derive(Debug, Clone)]
pub struct ProviderDirectory {
    providers: Vec<ProviderEntry>,
    source_name: String,
}

impl ProviderDirectory {
    /// Read and parse a provider file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let raw = std::fs::read_to_string(path).map_err(|source| DirectoryError::Read {
            path: display.clone(),
            source,
        })?;

        let source_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| display.clone());

        Self::from_json_str(&raw, source_name).map_err(|source| DirectoryError::Parse {
            path: display,
            source,
        })
    }

    /// Parse a provider list from JSON text.
    pub fn from_json_str(
        raw: &str,
        source_name: impl Into<String>,
    ) -> Result<Self, serde_json::Error> {
        let providers: Vec<ProviderEntry> = serde_json::from_str(raw)?;
        Ok(Self::from_entries(providers, source_name))
    }

    /// Build a directory from already parsed entries, in load order.
    pub fn from_entries(providers: Vec<ProviderEntry>, source_name: impl Into<String>) -> Self {
        let directory = Self {
            providers,
            source_name: source_name.into(),
        };
        directory.log_summary();
        directory
    }

    /// First provider/model pair, in load order, whose public name matches.
    pub fn resolve(&self, public_name: &str) -> Option<ResolvedTarget> {
        self.providers.iter().find_map(|provider| {
            provider
                .models
                .iter()
                .find(|model| model.public_name == public_name)
                .map(|model| ResolvedTarget {
                    upstream_url: provider.base_url.clone(),
                    upstream_model: model.upstream_name.clone(),
                    credential: provider.credential.clone().unwrap_or_default(),
                })
        })
    }

    /// Name of the source the directory was loaded from, used in not-found messages.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Public model names in resolution order, shadowed duplicates omitted.
    pub fn public_models(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.providers
            .iter()
            .flat_map(|p| p.models.iter())
            .map(|m| m.public_name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    fn log_summary(&self) {
        let mut seen = HashSet::new();
        let mut total = 0usize;
        for provider in &self.providers {
            for model in &provider.models {
                total += 1;
                if !seen.insert(model.public_name.as_str()) {
                    warn!(
                        model = %model.public_name,
                        url = %provider.base_url,
                        "Public model name already defined by an earlier provider; this entry is shadowed"
                    );
                }
            }
        }

        info!(
            source = %self.source_name,
            providers = self.providers.len(),
            models = total,
            "Provider directory loaded"
        );
    }
}
