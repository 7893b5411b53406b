//! Civitai catalog client.
//!
//! Civitai is the only catalog with a content-hash endpoint, so it is the
//! source of verified matches.

use super::http::{ProviderHttp, ProviderHttpOptions};
use super::{CatalogProvider, ProviderCapabilities};
use crate::catalog::{CatalogEntry, CivitaiModel, CivitaiModelVersion, Provider, RelatedQuery};
use crate::config::{NetworkConfig, ResolverConfig};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

/// Client for `https://civitai.com/api/v1`.
#[derive(Debug)]
pub struct CivitaiClient {
    http: ProviderHttp,
    search_limit: u32,
}

impl CivitaiClient {
    pub fn new(options: ProviderHttpOptions, search_limit: u32) -> Result<Self> {
        Ok(Self {
            http: ProviderHttp::new(options)?,
            search_limit,
        })
    }

    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        Self::new(
            ProviderHttpOptions::from_config(Provider::Civitai, config),
            config.search_limit,
        )
    }

    pub fn http(&self) -> &ProviderHttp {
        &self.http
    }

    /// Fetch a model page by numeric id.
    pub async fn get_model(&self, model_id: u64) -> Result<Option<CivitaiModel>> {
        match self.http.get_json(&format!("/models/{}", model_id), &[]).await {
            Ok(body) => Ok(Some(serde_json::from_value(body)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch the version whose file carries `hash`.
    pub async fn get_version_by_hash(&self, hash: &str) -> Result<Option<CivitaiModelVersion>> {
        let path = format!("/model-versions/by-hash/{}", urlencoding::encode(hash));
        match self.http.get_json(&path, &[]).await {
            Ok(body) => Ok(Some(serde_json::from_value(body)?)),
            Err(e) if e.is_not_found() => {
                debug!("No Civitai version for hash {}", hash);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn list_models(&self, query: &[(&str, String)]) -> Result<Vec<CatalogEntry>> {
        let body = self.http.get_json("/models", query).await?;
        Ok(parse_items(body))
    }
}

/// Decode the `items` array of a paged listing, skipping malformed entries.
fn parse_items(body: Value) -> Vec<CatalogEntry> {
    let items = match body {
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<CivitaiModel>(item) {
            Ok(model) => Some(CatalogEntry::Civitai(model)),
            Err(e) => {
                debug!("Skipping malformed Civitai item: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl CatalogProvider for CivitaiClient {
    fn provider(&self) -> Provider {
        Provider::Civitai
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            hash_search: true,
            name_search: true,
            related_search: true,
        }
    }

    async fn search_by_name(&self, query: &str) -> Result<Vec<CatalogEntry>> {
        let results = self
            .list_models(&[
                ("query", query.to_string()),
                ("limit", self.search_limit.to_string()),
            ])
            .await?;
        debug!("Civitai search '{}' returned {} models", query, results.len());
        Ok(results)
    }

    async fn search_by_hash(&self, hash: &str) -> Result<Vec<CatalogEntry>> {
        if hash.is_empty() {
            return Ok(Vec::new());
        }
        let Some(version) = self.get_version_by_hash(hash).await? else {
            return Ok(Vec::new());
        };
        let Some(model_id) = version.model_id else {
            return Ok(Vec::new());
        };
        let Some(mut model) = self.get_model(model_id).await? else {
            return Ok(Vec::new());
        };

        // The model page can lag behind a freshly published version.
        if model.version(version.id).is_none() {
            model.model_versions.insert(0, version);
        }
        info!("Civitai hash match: {} ({})", model.name, model.id);
        Ok(vec![CatalogEntry::Civitai(model)])
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<CatalogEntry>> {
        let Ok(model_id) = id.parse::<u64>() else {
            return Ok(None);
        };
        Ok(self.get_model(model_id).await?.map(CatalogEntry::Civitai))
    }

    async fn search_related(&self, query: &RelatedQuery) -> Result<Vec<CatalogEntry>> {
        let mut params = Vec::with_capacity(4);
        if let Some(model_type) = query.kind.civitai_type() {
            params.push(("types", model_type.to_string()));
        }
        params.push(("baseModels", query.family.clone()));
        params.push((
            "limit",
            query.limit.min(NetworkConfig::RELATED_LIMIT).to_string(),
        ));
        params.push(("sort", "Most Downloaded".to_string()));
        self.list_models(&params).await
    }

    fn clear_cache(&self) {
        self.http.clear_cache();
    }

    async fn set_api_key(&self, key: Option<String>) {
        self.http.set_token(key).await;
    }
}
