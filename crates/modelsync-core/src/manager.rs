//! Resolution orchestrator.
//!
//! `MetadataManager` ties the hasher, provider clients, scorer, relationship
//! builder and metadata store together. Provider and hashing failures never
//! surface from a resolution: they degrade to "no results" and the file is
//! recorded as unknown.

use crate::catalog::{CatalogEntry, CatalogModel, Provider};
use crate::config::{ProviderOrder, ResolverConfig};
use crate::error::{ModelSyncError, Result};
use crate::hashing::FileHasher;
use crate::naming::{is_model_file, search_query_for};
use crate::providers::{CatalogProvider, CivitaiClient, HuggingFaceClient};
use crate::record::{EnhancedMetadata, ModelFile};
use crate::relationships::RelationshipBuilder;
use crate::scoring::{best_match, entry_name_score, find_matching_version, MatchReason};
use crate::store::{JsonFileBackend, MetadataStore, StoreStats};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Candidates returned by one provider for one file.
struct ProviderHit {
    provider: Provider,
    candidates: Vec<CatalogEntry>,
    /// Candidates came from an exact content-hash lookup.
    via_hash: bool,
}

/// Entry point for resolving local model files against remote catalogs.
pub struct MetadataManager {
    config: ResolverConfig,
    hasher: FileHasher,
    providers: HashMap<Provider, Arc<dyn CatalogProvider>>,
    relationships: RelationshipBuilder,
    store: RwLock<MetadataStore>,
}

impl std::fmt::Debug for MetadataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataManager")
            .field("provider_order", &self.config.provider_order)
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MetadataManager {
    /// Build a manager from explicit parts.
    pub fn new(
        config: ResolverConfig,
        providers: Vec<Arc<dyn CatalogProvider>>,
        store: MetadataStore,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.provider(), p))
            .collect();
        Self {
            config,
            hasher: FileHasher::default(),
            providers,
            relationships: RelationshipBuilder::default(),
            store: RwLock::new(store),
        }
    }

    /// Manager with the Civitai and HuggingFace clients and a JSON store at
    /// `store_path`.
    pub fn from_config(config: ResolverConfig, store_path: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        let providers: Vec<Arc<dyn CatalogProvider>> = vec![
            Arc::new(CivitaiClient::from_config(&config)?),
            Arc::new(HuggingFaceClient::from_config(&config)?),
        ];
        let store = MetadataStore::open(JsonFileBackend::new(store_path));
        Ok(Self::new(config, providers, store))
    }

    /// Replace the hasher (e.g. with smaller sampling limits).
    pub fn with_hasher(mut self, hasher: FileHasher) -> Self {
        self.hasher = hasher;
        self
    }

    // ========================================
    // Resolution
    // ========================================

    /// Resolve one file, returning the cached record when it is still fresh.
    pub async fn resolve(&self, path: impl AsRef<Path>, force_refresh: bool) -> Result<EnhancedMetadata> {
        let record = self.resolve_unpersisted(path.as_ref(), force_refresh).await?;
        self.persist_logged();
        Ok(record)
    }

    /// Resolve against exactly one provider.
    ///
    /// The store is only updated when that provider identifies the file;
    /// otherwise an unknown record is returned and the existing record stays.
    pub async fn resolve_with_provider(
        &self,
        path: impl AsRef<Path>,
        provider: Provider,
        force_refresh: bool,
    ) -> Result<EnhancedMetadata> {
        let (record, stored) = self
            .resolve_with_provider_unpersisted(path.as_ref(), provider, force_refresh)
            .await?;
        if stored {
            self.persist_logged();
        }
        Ok(record)
    }

    /// Resolve many files sequentially.
    ///
    /// Non-model paths are skipped, per-file failures are logged, and the
    /// store is persisted every `batch_persist_interval` files and once at
    /// the end.
    pub async fn batch_resolve<P: AsRef<Path>>(
        &self,
        paths: &[P],
    ) -> HashMap<PathBuf, EnhancedMetadata> {
        let model_paths: Vec<&Path> = paths
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| is_model_file(p))
            .collect();
        info!(
            "Batch resolving {} model files ({} skipped)",
            model_paths.len(),
            paths.len() - model_paths.len()
        );

        let mut results = HashMap::with_capacity(model_paths.len());
        for (index, path) in model_paths.iter().enumerate() {
            match self.resolve_unpersisted(path, false).await {
                Ok(record) => {
                    results.insert(path.to_path_buf(), record);
                }
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
            if (index + 1) % self.persist_interval() == 0 {
                info!("Batch progress: {}/{}", index + 1, model_paths.len());
                self.persist_logged();
            }
        }
        self.persist_logged();
        results
    }

    // ========================================
    // Cached reads
    // ========================================

    /// Cached record for `path`, stale or not. Never touches the network.
    pub fn get_cached(&self, path: impl AsRef<Path>) -> Option<EnhancedMetadata> {
        self.read_store()
            .ok()
            .and_then(|store| store.get(path.as_ref()).cloned())
    }

    /// Cached records whose entry is the file's parent, a compatible model
    /// or a child model.
    pub fn get_relationships(&self, path: impl AsRef<Path>) -> Vec<EnhancedMetadata> {
        let path = path.as_ref();
        let Ok(store) = self.read_store() else {
            return Vec::new();
        };
        let Some(record) = store.get(path) else {
            return Vec::new();
        };
        let related: HashSet<&str> = record.relationships.related_ids().collect();
        if related.is_empty() {
            return Vec::new();
        }

        store
            .records()
            .filter(|other| other.local_path != path)
            .filter(|other| {
                other
                    .entry_id()
                    .is_some_and(|id| related.contains(id.as_str()))
            })
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        self.read_store()
            .map(|store| store.stats(self.config.staleness_window()))
            .unwrap_or_default()
    }

    // ========================================
    // Refresh
    // ========================================

    /// Force re-resolution of one file, or of every cached path when `None`.
    pub async fn refresh(&self, path: Option<&Path>) -> Result<HashMap<PathBuf, EnhancedMetadata>> {
        match path {
            Some(path) => {
                let record = self.resolve(path, true).await?;
                Ok(HashMap::from([(path.to_path_buf(), record)]))
            }
            None => Ok(self.refresh_all(None).await),
        }
    }

    /// Re-resolve every cached path, optionally against a single provider.
    pub async fn refresh_all(&self, provider: Option<Provider>) -> HashMap<PathBuf, EnhancedMetadata> {
        let paths = match self.read_store() {
            Ok(store) => store.paths(),
            Err(e) => {
                warn!("Cannot refresh: {}", e);
                return HashMap::new();
            }
        };
        info!(
            "Refreshing {} cached records{}",
            paths.len(),
            provider.map(|p| format!(" against {}", p)).unwrap_or_default()
        );

        let mut results = HashMap::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            let outcome = match provider {
                Some(provider) => self
                    .resolve_with_provider_unpersisted(path, provider, true)
                    .await
                    .map(|(record, _)| record),
                None => self.resolve_unpersisted(path, true).await,
            };
            match outcome {
                Ok(record) => {
                    results.insert(path.clone(), record);
                }
                Err(e) => warn!("Refresh of {} failed: {}", path.display(), e),
            }
            if (index + 1) % self.persist_interval() == 0 {
                self.persist_logged();
            }
        }
        self.persist_logged();
        results
    }

    // ========================================
    // Maintenance
    // ========================================

    /// Set or clear the bearer credential for one provider.
    pub async fn set_api_key(&self, provider: Provider, key: Option<String>) -> Result<()> {
        let client = self
            .providers
            .get(&provider)
            .ok_or(ModelSyncError::UnsupportedProvider(provider))?;
        client.set_api_key(key).await;
        Ok(())
    }

    /// Drop the record for `path`.
    pub fn remove(&self, path: impl AsRef<Path>) -> Result<Option<EnhancedMetadata>> {
        let removed = self.write_store()?.remove(path.as_ref());
        if removed.is_some() {
            self.persist_logged();
        }
        Ok(removed)
    }

    /// Drop every record and every provider response memo.
    pub fn clear_cache(&self) -> Result<()> {
        self.write_store()?.clear();
        for provider in self.providers.values() {
            provider.clear_cache();
        }
        self.persist_logged();
        info!("Metadata cache cleared");
        Ok(())
    }

    /// Drop records whose path is not a recognised model file.
    pub fn cleanup_non_model_entries(&self) -> Result<usize> {
        let dropped = self.write_store()?.retain(|path, _| is_model_file(path));
        if dropped > 0 {
            info!("Removed {} non-model records", dropped);
            self.persist_logged();
        }
        Ok(dropped)
    }

    // ========================================
    // Internals
    // ========================================

    async fn resolve_unpersisted(&self, path: &Path, force_refresh: bool) -> Result<EnhancedMetadata> {
        if !is_model_file(path) {
            return Err(ModelSyncError::NotAModelFile(path.to_path_buf()));
        }
        if !force_refresh {
            if let Some(record) = self.fresh_cached(path, None)? {
                debug!("Fresh cache hit for {}", path.display());
                return Ok(record);
            }
        }

        let file = self.hashed_file(path).await;
        let mut record = None;
        for provider in self.provider_chain() {
            if let Some(hit) = self.search_provider(provider, &file).await {
                record = Some(self.build_record(&file, hit).await);
                break;
            }
        }
        let record = record.unwrap_or_else(|| {
            info!("No catalog match for {}", file.filename);
            EnhancedMetadata::unknown(&file.path, file.hash.clone())
        });

        self.write_store()?.set(record.clone());
        Ok(record)
    }

    /// Returns the record and whether it was written to the store.
    async fn resolve_with_provider_unpersisted(
        &self,
        path: &Path,
        provider: Provider,
        force_refresh: bool,
    ) -> Result<(EnhancedMetadata, bool)> {
        if !is_model_file(path) {
            return Err(ModelSyncError::NotAModelFile(path.to_path_buf()));
        }
        if !self.providers.contains_key(&provider) {
            return Err(ModelSyncError::UnsupportedProvider(provider));
        }
        if !force_refresh {
            if let Some(record) = self.fresh_cached(path, Some(provider))? {
                return Ok((record, false));
            }
        }

        let file = self.hashed_file(path).await;
        match self.search_provider(provider, &file).await {
            Some(hit) => {
                let record = self.build_record(&file, hit).await;
                self.write_store()?.set(record.clone());
                Ok((record, true))
            }
            None => {
                debug!("{} has no match for {}", provider, file.filename);
                Ok((EnhancedMetadata::unknown(&file.path, file.hash.clone()), false))
            }
        }
    }

    /// Records between intermediate saves. A zero interval from an
    /// unvalidated config saves after every file.
    fn persist_interval(&self) -> usize {
        self.config.batch_persist_interval.max(1)
    }

    fn fresh_cached(&self, path: &Path, provider: Option<Provider>) -> Result<Option<EnhancedMetadata>> {
        let store = self.read_store()?;
        if !store.is_fresh(path, self.config.staleness_window()) {
            return Ok(None);
        }
        Ok(store
            .get(path)
            .filter(|r| provider.map_or(true, |p| r.provider == p))
            .cloned())
    }

    async fn hashed_file(&self, path: &Path) -> ModelFile {
        let mut file = ModelFile::new(path);
        file.hash = Some(self.hasher.hash_async(path).await);
        file
    }

    fn provider_chain(&self) -> [Provider; 2] {
        match self.config.provider_order {
            ProviderOrder::HuggingFaceFirst => [Provider::HuggingFace, Provider::Civitai],
            ProviderOrder::CivitaiFirst => [Provider::Civitai, Provider::HuggingFace],
        }
    }

    /// Query one provider: hash lookup first when supported, then name search.
    /// Provider failures are logged and treated as no results.
    async fn search_provider(&self, provider: Provider, file: &ModelFile) -> Option<ProviderHit> {
        let client = self.providers.get(&provider)?;
        let capabilities = client.capabilities();

        if capabilities.hash_search {
            if let Some(hash) = file.usable_hash() {
                match client.search_by_hash(hash).await {
                    Ok(candidates) if !candidates.is_empty() => {
                        return Some(ProviderHit {
                            provider,
                            candidates,
                            via_hash: true,
                        });
                    }
                    Ok(_) => debug!("{} has no entry for hash {}", provider, hash),
                    Err(e) => warn!("{} hash lookup failed: {}", provider, e),
                }
            }
        }

        if !capabilities.name_search {
            return None;
        }
        let query = search_query_for(&file.filename);
        match client.search_by_name(&query).await {
            Ok(candidates) if !candidates.is_empty() => Some(ProviderHit {
                provider,
                candidates,
                via_hash: false,
            }),
            Ok(_) => None,
            Err(e) => {
                warn!("{} search for '{}' failed: {}", provider, query, e);
                None
            }
        }
    }

    async fn build_record(&self, file: &ModelFile, hit: ProviderHit) -> EnhancedMetadata {
        let best = best_match(&hit.candidates, &file.filename).clone();
        let version = find_matching_version(&best, &file.filename, file.usable_hash());

        let exact_single = hit.candidates.len() == 1 && entry_name_score(&best, &file.filename) >= 1.0;
        let is_verified = hit.via_hash
            || version.as_ref().is_some_and(|v| v.reason == MatchReason::Hash)
            || exact_single;

        let variant = version.map(|v| v.variant);
        let relationships = match self.providers.get(&hit.provider) {
            Some(client) => {
                self.relationships
                    .build(client.as_ref(), &best, variant.as_ref(), &file.filename)
                    .await
            }
            None => Default::default(),
        };

        info!(
            "Matched {} to {} {} ({}){}",
            file.filename,
            hit.provider,
            best.id(),
            best.name(),
            if is_verified { " [verified]" } else { "" }
        );
        EnhancedMetadata::resolved(
            &file.path,
            best,
            variant,
            is_verified,
            relationships,
            file.hash.clone(),
        )
    }

    fn read_store(&self) -> Result<RwLockReadGuard<'_, MetadataStore>> {
        self.store.read().map_err(|_| ModelSyncError::StoreIo {
            message: "metadata store lock poisoned".to_string(),
        })
    }

    fn write_store(&self) -> Result<RwLockWriteGuard<'_, MetadataStore>> {
        self.store.write().map_err(|_| ModelSyncError::StoreIo {
            message: "metadata store lock poisoned".to_string(),
        })
    }

    /// Persist, keeping the in-memory state when the write fails.
    fn persist_logged(&self) {
        let result = self.read_store().and_then(|store| store.persist());
        if let Err(e) = result {
            warn!("Failed to persist metadata store: {}", e);
        }
    }
}
