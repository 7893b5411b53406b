//! Catalog provider clients.
//!
//! Each client wraps one remote catalog behind the [`CatalogProvider`] trait.
//! Both share [`ProviderHttp`] for request pacing, response memoization and
//! credential handling.

mod civitai;
mod http;
mod huggingface;

pub use civitai::CivitaiClient;
pub use http::{ProviderHttp, ProviderHttpOptions};
pub use huggingface::HuggingFaceClient;

use crate::catalog::{CatalogEntry, Provider, RelatedQuery};
use crate::error::Result;
use async_trait::async_trait;

/// Operations a provider actually implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    pub hash_search: bool,
    pub name_search: bool,
    pub related_search: bool,
}

/// A remote model catalog.
///
/// Implementations return provider failures as errors; the orchestrator is
/// responsible for degrading them to "no results".
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    fn provider(&self) -> Provider;

    fn capabilities(&self) -> ProviderCapabilities;

    /// Free-text search, best candidates first.
    async fn search_by_name(&self, query: &str) -> Result<Vec<CatalogEntry>>;

    /// Exact lookup by content hash. Empty when the catalog has no match.
    async fn search_by_hash(&self, hash: &str) -> Result<Vec<CatalogEntry>>;

    /// Fetch one entry by its catalog id. `None` when the id does not exist.
    async fn get_by_id(&self, id: &str) -> Result<Option<CatalogEntry>>;

    /// Entries of a kind trained against a base-model family.
    async fn search_related(&self, query: &RelatedQuery) -> Result<Vec<CatalogEntry>>;

    /// Drop memoized responses.
    fn clear_cache(&self);

    /// Replace (or clear) the credential used for subsequent requests.
    async fn set_api_key(&self, key: Option<String>);
}
