//! Centralized configuration for the modelsync engine.
//!
//! Constant holders mirror the tunables that rarely change; [`ResolverConfig`]
//! carries the runtime policy a caller can override from a JSON file or the
//! environment.

use crate::atomic::atomic_read_json;
use crate::error::{ModelSyncError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Hashing thresholds.
pub struct HashingConfig;

impl HashingConfig {
    /// Files at or above this size get a sampled (head + tail) digest.
    pub const FULL_HASH_THRESHOLD: u64 = 100 * 1024 * 1024;
    pub const SAMPLE_SIZE: usize = 8 * 1024;
    pub const READ_BUFFER_SIZE: usize = 1024 * 1024;
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(500);
    pub const RESPONSE_CACHE_TTL: Duration = Duration::from_secs(3600);
    pub const RESPONSE_CACHE_CAPACITY: u64 = 512;
    pub const SEARCH_LIMIT: u32 = 10;
    pub const RELATED_LIMIT: u32 = 20;
    pub const USER_AGENT: &'static str = "modelsync/0.1";
    pub const CIVITAI_API_BASE: &'static str = "https://civitai.com/api/v1";
    pub const HUGGINGFACE_API_BASE: &'static str = "https://huggingface.co/api";
    pub const CIVITAI_KEY_ENV_VAR: &'static str = "CIVITAI_API_KEY";
    pub const HF_TOKEN_ENV_VAR: &'static str = "HF_TOKEN";
}

/// Metadata store configuration.
pub struct StoreConfig;

impl StoreConfig {
    pub const STALENESS_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);
    pub const BATCH_PERSIST_INTERVAL: usize = 10;
    pub const SCHEMA_VERSION: u32 = 2;
    pub const DEFAULT_FILENAME: &'static str = "model-metadata.json";
}

/// Order in which providers are consulted by the default resolution flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderOrder {
    /// Name search on HuggingFace, then Civitai hash + name search.
    #[default]
    HuggingFaceFirst,
    /// Civitai hash + name search, then name search on HuggingFace.
    CivitaiFirst,
}

/// Runtime configuration for a resolution session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    pub provider_order: ProviderOrder,
    pub staleness_window_secs: u64,
    pub batch_persist_interval: usize,
    pub min_request_interval_ms: u64,
    pub response_cache_ttl_secs: u64,
    pub search_limit: u32,
    pub civitai_base_url: String,
    pub huggingface_base_url: String,
    pub civitai_api_key: Option<String>,
    pub huggingface_token: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            provider_order: ProviderOrder::default(),
            staleness_window_secs: StoreConfig::STALENESS_WINDOW.as_secs(),
            batch_persist_interval: StoreConfig::BATCH_PERSIST_INTERVAL,
            min_request_interval_ms: NetworkConfig::MIN_REQUEST_INTERVAL.as_millis() as u64,
            response_cache_ttl_secs: NetworkConfig::RESPONSE_CACHE_TTL.as_secs(),
            search_limit: NetworkConfig::SEARCH_LIMIT,
            civitai_base_url: NetworkConfig::CIVITAI_API_BASE.to_string(),
            huggingface_base_url: NetworkConfig::HUGGINGFACE_API_BASE.to_string(),
            civitai_api_key: None,
            huggingface_token: None,
        }
    }
}

impl ResolverConfig {
    /// Load a config file, falling back to defaults for a missing file.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Option<Self> = atomic_read_json(path)?;
        let config = config.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Fill absent credentials from `CIVITAI_API_KEY` / `HF_TOKEN`.
    pub fn with_env_overrides(mut self) -> Self {
        if self.civitai_api_key.is_none() {
            self.civitai_api_key = env_token(NetworkConfig::CIVITAI_KEY_ENV_VAR);
        }
        if self.huggingface_token.is_none() {
            self.huggingface_token = env_token(NetworkConfig::HF_TOKEN_ENV_VAR);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_persist_interval == 0 {
            return Err(ModelSyncError::Config {
                message: "batchPersistInterval must be at least 1".to_string(),
            });
        }
        if self.search_limit == 0 {
            return Err(ModelSyncError::Config {
                message: "searchLimit must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.staleness_window_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn response_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.response_cache_ttl_secs)
    }
}

fn env_token(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
