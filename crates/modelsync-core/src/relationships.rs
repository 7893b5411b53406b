//! Base-model / adapter relationship discovery.
//!
//! A base model is linked to adapters trained against the same family; an
//! adapter is linked to the base model it targets. Lookups go to the same
//! provider the entry came from. Every failure leaves the edges empty.

use crate::catalog::{
    infer_base_model_family, CatalogEntry, CatalogModel, CatalogVariant, ModelKind, RelatedQuery,
};
use crate::config::NetworkConfig;
use crate::providers::CatalogProvider;
use crate::record::Relationships;
use tracing::{debug, warn};

/// Builds [`Relationships`] for a resolved entry.
#[derive(Debug, Clone)]
pub struct RelationshipBuilder {
    related_limit: u32,
}

impl Default for RelationshipBuilder {
    fn default() -> Self {
        Self::new(NetworkConfig::RELATED_LIMIT)
    }
}

impl RelationshipBuilder {
    pub fn new(related_limit: u32) -> Self {
        Self { related_limit }
    }

    /// Discover edges for `entry`, querying `provider` when needed.
    pub async fn build(
        &self,
        provider: &dyn CatalogProvider,
        entry: &CatalogEntry,
        variant: Option<&CatalogVariant>,
        filename: &str,
    ) -> Relationships {
        let mut relationships = Relationships {
            base_model: infer_family(entry, variant, filename),
            ..Default::default()
        };

        let kind = entry.kind();
        if is_adapter(kind) {
            if let Some(parent) = declared_parent(entry) {
                relationships.parent_model_id = Some(parent);
                return relationships;
            }
        }

        let Some(family) = relationships.base_model.clone() else {
            debug!("No base-model family for {}, skipping relationships", entry.id());
            return relationships;
        };
        if !provider.capabilities().related_search {
            return relationships;
        }

        let related_kind = match kind {
            ModelKind::Checkpoint => ModelKind::Lora,
            k if is_adapter(k) => ModelKind::Checkpoint,
            _ => return relationships,
        };
        let query = RelatedQuery {
            kind: related_kind,
            family,
            limit: self.related_limit,
        };

        let related = match provider.search_related(&query).await {
            Ok(related) => related,
            Err(e) => {
                warn!("Relationship lookup for {} failed: {}", entry.id(), e);
                return relationships;
            }
        };

        let own_id = entry.id();
        let others = related.iter().filter(|c| c.id() != own_id);
        if kind == ModelKind::Checkpoint {
            for candidate in others {
                let id = candidate.id();
                if declared_parent(candidate).as_deref() == Some(own_id.as_str()) {
                    relationships.child_models.push(id.clone());
                }
                relationships.compatible_models.push(id);
            }
        } else {
            relationships.parent_model_id = others.map(|c| c.id()).next();
        }

        debug!(
            "{}: {} compatible, {} children, parent {:?}",
            own_id,
            relationships.compatible_models.len(),
            relationships.child_models.len(),
            relationships.parent_model_id
        );
        relationships
    }
}

fn is_adapter(kind: ModelKind) -> bool {
    matches!(
        kind,
        ModelKind::Lora | ModelKind::Embedding | ModelKind::Controlnet
    )
}

/// Explicit parent id stated by the catalog (HuggingFace `base_model:` tags).
fn declared_parent(entry: &CatalogEntry) -> Option<String> {
    entry.as_huggingface().and_then(|m| m.declared_parent())
}

/// Base-model family from the matched variant, the entry, or the filename.
///
/// Civitai labels the catalog does not know are kept verbatim since they
/// are still valid `baseModels` filters.
pub fn infer_family(
    entry: &CatalogEntry,
    variant: Option<&CatalogVariant>,
    filename: &str,
) -> Option<String> {
    let from_catalog = match entry {
        CatalogEntry::Civitai(model) => {
            let label = match variant {
                Some(CatalogVariant::Civitai(v)) => v.base_model.clone(),
                _ => None,
            }
            .or_else(|| model.base_model());
            label.map(|l| {
                infer_base_model_family(&l)
                    .map(str::to_string)
                    .unwrap_or(l)
            })
        }
        CatalogEntry::HuggingFace(model) => model
            .declared_parent()
            .and_then(|p| infer_base_model_family(&p))
            .or_else(|| infer_base_model_family(&model.tags.join(" ")))
            .or_else(|| infer_base_model_family(&model.id))
            .map(str::to_string),
    };

    from_catalog.or_else(|| infer_base_model_family(filename).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CivitaiModel, CivitaiModelVersion, CivitaiStats, HuggingFaceModel, Provider};
    use crate::error::{ModelSyncError, Result};
    use crate::providers::ProviderCapabilities;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubProvider {
        related: Result<Vec<CatalogEntry>>,
        queries: Mutex<Vec<RelatedQuery>>,
    }

    impl StubProvider {
        fn returning(related: Vec<CatalogEntry>) -> Self {
            Self {
                related: Ok(related),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                related: Err(ModelSyncError::ProviderRequestFailed {
                    provider: Provider::HuggingFace,
                    status: Some(500),
                    message: "boom".into(),
                }),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn query_count(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CatalogProvider for StubProvider {
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
        async fn search_by_name(&self, _query: &str) -> Result<Vec<CatalogEntry>> {
            Ok(Vec::new())
        }
        async fn search_by_hash(&self, _hash: &str) -> Result<Vec<CatalogEntry>> {
            Ok(Vec::new())
        }
        async fn get_by_id(&self, _id: &str) -> Result<Option<CatalogEntry>> {
            Ok(None)
        }
        async fn search_related(&self, query: &RelatedQuery) -> Result<Vec<CatalogEntry>> {
            self.queries.lock().unwrap().push(query.clone());
            match &self.related {
                Ok(entries) => Ok(entries.clone()),
                Err(_) => Err(ModelSyncError::Other("related search failed".into())),
            }
        }
        fn clear_cache(&self) {}
        async fn set_api_key(&self, _key: Option<String>) {}
    }

    fn hf(id: &str, tags: &[&str]) -> CatalogEntry {
        CatalogEntry::HuggingFace(HuggingFaceModel {
            id: id.into(),
            model_id: None,
            author: None,
            downloads: 0,
            likes: 0,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            pipeline_tag: Some("text-to-image".into()),
            library_name: Some("diffusers".into()),
            last_modified: None,
            siblings: vec![],
        })
    }

    fn civitai_lora(base_model: &str) -> CatalogEntry {
        CatalogEntry::Civitai(CivitaiModel {
            id: 7,
            name: "detail tweaker".into(),
            description: None,
            model_type: "LORA".into(),
            nsfw: false,
            tags: vec![],
            creator: None,
            stats: CivitaiStats::default(),
            model_versions: vec![CivitaiModelVersion {
                id: 70,
                model_id: Some(7),
                name: "v1".into(),
                base_model: Some(base_model.into()),
                trained_words: vec![],
                download_url: None,
                created_at: None,
                files: vec![],
            }],
        })
    }

    #[tokio::test]
    async fn test_base_model_collects_compatible_and_children() {
        let base_id = "stabilityai/stable-diffusion-xl-base-1.0";
        let parent_tag = format!("base_model:adapter:{base_id}");
        let provider = StubProvider::returning(vec![
            hf("someone/xl-lora", &["lora", parent_tag.as_str()]),
            hf("other/xl-style", &["lora"]),
            hf(base_id, &[]),
        ]);
        let base = hf(base_id, &[]);

        let rel = RelationshipBuilder::default()
            .build(&provider, &base, None, "sd_xl_base_1.0.safetensors")
            .await;
        assert_eq!(rel.base_model.as_deref(), Some("SDXL 1.0"));
        assert_eq!(rel.compatible_models, vec!["someone/xl-lora", "other/xl-style"]);
        assert_eq!(rel.child_models, vec!["someone/xl-lora"]);
        assert!(rel.parent_model_id.is_none());

        let queries = provider.queries.lock().unwrap();
        assert_eq!(queries[0].kind, ModelKind::Lora);
        assert_eq!(queries[0].family, "SDXL 1.0");
    }

    #[tokio::test]
    async fn test_declared_parent_skips_network() {
        let provider = StubProvider::returning(vec![]);
        let adapter = hf(
            "someone/v15-lora",
            &["lora", "base_model:runwayml/stable-diffusion-v1-5"],
        );
        let rel = RelationshipBuilder::default()
            .build(&provider, &adapter, None, "v15_lora.safetensors")
            .await;
        assert_eq!(
            rel.parent_model_id.as_deref(),
            Some("runwayml/stable-diffusion-v1-5")
        );
        assert_eq!(rel.base_model.as_deref(), Some("SD 1.5"));
        assert_eq!(provider.query_count(), 0);
    }

    #[tokio::test]
    async fn test_adapter_takes_first_base_model() {
        let provider = StubProvider::returning(vec![
            hf("runwayml/stable-diffusion-v1-5", &[]),
            hf("other/base", &[]),
        ]);
        let rel = RelationshipBuilder::default()
            .build(&provider, &civitai_lora("SD 1.5"), None, "detail.safetensors")
            .await;
        assert_eq!(
            rel.parent_model_id.as_deref(),
            Some("runwayml/stable-diffusion-v1-5")
        );
        assert_eq!(provider.queries.lock().unwrap()[0].kind, ModelKind::Checkpoint);
    }

    #[tokio::test]
    async fn test_failure_leaves_edges_empty() {
        let provider = StubProvider::failing();
        let rel = RelationshipBuilder::default()
            .build(&provider, &civitai_lora("SDXL 1.0"), None, "x.safetensors")
            .await;
        assert!(rel.is_empty());
        assert_eq!(rel.base_model.as_deref(), Some("SDXL 1.0"));
    }

    #[test]
    fn test_infer_family_keeps_unknown_civitai_label() {
        let entry = civitai_lora("Hunyuan Video");
        assert_eq!(
            infer_family(&entry, None, "x.safetensors").as_deref(),
            Some("Hunyuan Video")
        );
    }

    #[test]
    fn test_infer_family_falls_back_to_filename() {
        let entry = hf("someone/mystery", &[]);
        assert_eq!(
            infer_family(&entry, None, "mystery_sdxl.safetensors").as_deref(),
            Some("SDXL 1.0")
        );
    }
}
