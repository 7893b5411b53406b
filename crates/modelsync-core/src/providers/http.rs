//! Shared HTTP plumbing for catalog clients.
//!
//! Provides:
//! - A request gate enforcing a minimum interval between outbound calls
//! - A TTL response memo keyed by request signature
//! - Bearer credentials with a single anonymous retry on 401

use crate::catalog::Provider;
use crate::config::{NetworkConfig, ResolverConfig};
use crate::error::{ModelSyncError, Result};
use mini_moka::sync::Cache;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Construction parameters for [`ProviderHttp`].
#[derive(Debug, Clone)]
pub struct ProviderHttpOptions {
    pub provider: Provider,
    pub base_url: String,
    pub min_request_interval: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: u64,
    pub token: Option<String>,
}

impl ProviderHttpOptions {
    /// Options for `provider` drawn from a resolver config.
    pub fn from_config(provider: Provider, config: &ResolverConfig) -> Self {
        let (base_url, token) = match provider {
            Provider::Civitai => (
                config.civitai_base_url.clone(),
                config.civitai_api_key.clone(),
            ),
            _ => (
                config.huggingface_base_url.clone(),
                config.huggingface_token.clone(),
            ),
        };
        Self {
            provider,
            base_url,
            min_request_interval: config.min_request_interval(),
            cache_ttl: config.response_cache_ttl(),
            cache_capacity: NetworkConfig::RESPONSE_CACHE_CAPACITY,
            token,
        }
    }
}

/// Paced, memoizing JSON GET client for one catalog.
pub struct ProviderHttp {
    provider: Provider,
    client: Client,
    base_url: String,
    min_interval: Duration,
    /// When the last request was released through the gate.
    last_request: Mutex<Option<Instant>>,
    memo: Cache<String, Value>,
    auth_token: Arc<RwLock<Option<String>>>,
    requests_sent: AtomicU64,
}

impl std::fmt::Debug for ProviderHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHttp")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("min_interval", &self.min_interval)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

impl ProviderHttp {
    pub fn new(options: ProviderHttpOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| ModelSyncError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            provider: options.provider,
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            min_interval: options.min_request_interval,
            last_request: Mutex::new(None),
            memo: Cache::builder()
                .time_to_live(options.cache_ttl)
                .max_capacity(options.cache_capacity)
                .build(),
            auth_token: Arc::new(RwLock::new(
                options
                    .token
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty()),
            )),
            requests_sent: AtomicU64::new(0),
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// GET `path` (relative to the base URL) and decode the JSON body.
    ///
    /// Memoized responses are returned without touching the network. A 401
    /// on an authenticated request is retried once without credentials.
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let token = self.auth_token.read().await.clone();

        let key = memo_key(&url, query, token.is_some());
        if let Some(value) = self.memo.get(&key) {
            debug!("{} memo hit for {}", self.provider, key);
            return Ok(value);
        }

        match self.send(&url, query, token.as_deref()).await {
            Ok(value) => {
                self.memo.insert(key, value.clone());
                Ok(value)
            }
            Err(e) if token.is_some() && e.status() == Some(StatusCode::UNAUTHORIZED.as_u16()) => {
                warn!(
                    "{} rejected credentials for {}, retrying anonymously",
                    self.provider, url
                );
                let anon_key = memo_key(&url, query, false);
                if let Some(value) = self.memo.get(&anon_key) {
                    return Ok(value);
                }
                let value = self.send(&url, query, None).await?;
                self.memo.insert(anon_key, value.clone());
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    async fn send(&self, url: &str, query: &[(&str, String)], token: Option<&str>) -> Result<Value> {
        self.wait_for_slot().await;
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        debug!("{} GET {} {:?}", self.provider, url, query);

        let mut request = self.client.get(url).query(query);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModelSyncError::provider_transport(self.provider, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModelSyncError::ProviderRequestFailed {
                provider: self.provider,
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        response.json::<Value>().await.map_err(|e| ModelSyncError::Json {
            message: format!("Failed to parse {} response: {}", self.provider, e),
            source: None,
        })
    }

    /// Block until at least `min_interval` has passed since the previous
    /// request. The lock is held while sleeping so callers queue in order.
    async fn wait_for_slot(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.auth_token.write().await = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        debug!("{} credentials updated", self.provider);
    }

    pub async fn has_token(&self) -> bool {
        self.auth_token.read().await.is_some()
    }

    pub fn clear_cache(&self) {
        self.memo.invalidate_all();
    }

    /// Number of requests that went out over the network.
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::Relaxed)
    }
}

/// Request signature: URL, query parameters in sorted order, and whether
/// credentials were attached.
fn memo_key(url: &str, query: &[(&str, String)], authenticated: bool) -> String {
    let mut params: Vec<String> = query
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();
    params.sort();
    format!("{}?{}#auth={}", url, params.join("&"), authenticated)
}

/// Encode each segment of a slash-separated catalog id for use in a path.
pub(crate) fn encode_path_id(id: &str) -> String {
    id.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
