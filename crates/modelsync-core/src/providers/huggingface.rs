//! HuggingFace Hub catalog client.

use super::http::{encode_path_id, ProviderHttp, ProviderHttpOptions};
use super::{CatalogProvider, ProviderCapabilities};
use crate::catalog::{family_search_term, CatalogEntry, HuggingFaceModel, Provider, RelatedQuery};
use crate::config::{NetworkConfig, ResolverConfig};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Client for `https://huggingface.co/api`.
#[derive(Debug)]
pub struct HuggingFaceClient {
    http: ProviderHttp,
    search_limit: u32,
}

impl HuggingFaceClient {
    pub fn new(options: ProviderHttpOptions, search_limit: u32) -> Result<Self> {
        Ok(Self {
            http: ProviderHttp::new(options)?,
            search_limit,
        })
    }

    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        Self::new(
            ProviderHttpOptions::from_config(Provider::HuggingFace, config),
            config.search_limit,
        )
    }

    pub fn http(&self) -> &ProviderHttp {
        &self.http
    }

    /// Fetch repo info by `owner/name`.
    pub async fn get_model_info(&self, repo_id: &str) -> Result<Option<HuggingFaceModel>> {
        // The slash is part of the path, so encode segments individually.
        let path = format!("/models/{}", encode_path_id(repo_id));
        match self.http.get_json(&path, &[]).await {
            Ok(body) => Ok(Some(serde_json::from_value(body)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_models(&self, query: &[(&str, String)]) -> Result<Vec<CatalogEntry>> {
        let body = self.http.get_json("/models", query).await?;
        Ok(parse_listing(body))
    }
}

fn parse_listing(body: Value) -> Vec<CatalogEntry> {
    let Value::Array(items) = body else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<HuggingFaceModel>(item) {
            Ok(model) => Some(CatalogEntry::HuggingFace(model)),
            Err(e) => {
                debug!("Skipping malformed HuggingFace item: {}", e);
                None
            }
        })
        .collect()
}

/// Query parameters shared by name and related searches.
fn listing_params(search: &str, limit: u32) -> Vec<(&'static str, String)> {
    vec![
        ("search", search.to_string()),
        ("limit", limit.to_string()),
        ("sort", "downloads".to_string()),
        ("direction", "-1".to_string()),
        ("full", "true".to_string()),
    ]
}

#[async_trait]
impl CatalogProvider for HuggingFaceClient {
    fn provider(&self) -> Provider {
        Provider::HuggingFace
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            hash_search: false,
            name_search: true,
            related_search: true,
        }
    }

    async fn search_by_name(&self, query: &str) -> Result<Vec<CatalogEntry>> {
        let results = self
            .list_models(&listing_params(query, self.search_limit))
            .await?;
        debug!(
            "HuggingFace search '{}' returned {} models",
            query,
            results.len()
        );
        Ok(results)
    }

    /// The Hub has no content-hash lookup.
    async fn search_by_hash(&self, _hash: &str) -> Result<Vec<CatalogEntry>> {
        Ok(Vec::new())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<CatalogEntry>> {
        if id.is_empty() {
            return Ok(None);
        }
        Ok(self
            .get_model_info(id)
            .await?
            .map(CatalogEntry::HuggingFace))
    }

    async fn search_related(&self, query: &RelatedQuery) -> Result<Vec<CatalogEntry>> {
        let mut params = listing_params(
            &family_search_term(&query.family),
            query.limit.min(NetworkConfig::RELATED_LIMIT),
        );
        if let Some(filter) = query.kind.huggingface_filter() {
            params.push(("filter", filter.to_string()));
        }
        self.list_models(&params).await
    }

    fn clear_cache(&self) {
        self.http.clear_cache();
    }

    async fn set_api_key(&self, key: Option<String>) {
        self.http.set_token(key).await;
    }
}
