//! The persisted resolution record for one local model file.

use crate::catalog::{
    CatalogEntry, CatalogModel, CatalogVariant, CivitaiModel, CivitaiModelVersion,
    HuggingFaceModel, Provider,
};
use crate::naming::file_name_of;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A local model artifact. Identity is the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFile {
    pub path: PathBuf,
    pub filename: String,
    /// Computed lazily during resolution; empty when hashing failed.
    pub hash: Option<String>,
}

impl ModelFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = file_name_of(&path);
        Self {
            path,
            filename,
            hash: None,
        }
    }

    /// Hash usable for exact matching.
    pub fn usable_hash(&self) -> Option<&str> {
        self.hash.as_deref().filter(|h| !h.is_empty())
    }
}

/// Graph edges discovered for a resolved entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationships {
    /// Entries that declare this one as their explicit parent.
    #[serde(default)]
    pub child_models: Vec<String>,
    /// Adapters trained against the same family (for a base model).
    #[serde(default)]
    pub compatible_models: Vec<String>,
    /// Base model an adapter was trained against.
    #[serde(default)]
    pub parent_model_id: Option<String>,
    /// Inferred base-model family label.
    #[serde(default)]
    pub base_model: Option<String>,
}

impl Relationships {
    pub fn is_empty(&self) -> bool {
        self.child_models.is_empty()
            && self.compatible_models.is_empty()
            && self.parent_model_id.is_none()
    }

    /// Every catalog id this record points at.
    pub fn related_ids(&self) -> impl Iterator<Item = &str> {
        self.parent_model_id
            .iter()
            .map(String::as_str)
            .chain(self.compatible_models.iter().map(String::as_str))
            .chain(self.child_models.iter().map(String::as_str))
    }
}

/// Persisted metadata for one local file.
///
/// Constructed only through [`EnhancedMetadata::unknown`] and
/// [`EnhancedMetadata::resolved`]: an `unknown` record never carries a
/// catalog entry and a verified record always does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedMetadata {
    pub local_path: PathBuf,
    pub filename: String,
    pub provider: Provider,
    #[serde(default)]
    pub entry: Option<CatalogEntry>,
    #[serde(default)]
    pub variant: Option<CatalogVariant>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub relationships: Relationships,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    pub last_synced: DateTime<Utc>,
}

impl EnhancedMetadata {
    /// A record for a file no catalog could identify.
    pub fn unknown(path: impl AsRef<Path>, file_hash: Option<String>) -> Self {
        let path = path.as_ref();
        Self {
            local_path: path.to_path_buf(),
            filename: file_name_of(path),
            provider: Provider::Unknown,
            entry: None,
            variant: None,
            is_verified: false,
            relationships: Relationships::default(),
            file_hash: file_hash.filter(|h| !h.is_empty()),
            last_synced: Utc::now(),
        }
    }

    /// A record matched to `entry`. The provider is taken from the entry.
    pub fn resolved(
        path: impl AsRef<Path>,
        entry: CatalogEntry,
        variant: Option<CatalogVariant>,
        is_verified: bool,
        relationships: Relationships,
        file_hash: Option<String>,
    ) -> Self {
        let path = path.as_ref();
        let variant = variant.filter(|v| v.provider() == entry.provider());
        Self {
            local_path: path.to_path_buf(),
            filename: file_name_of(path),
            provider: entry.provider(),
            entry: Some(entry),
            variant,
            is_verified,
            relationships,
            file_hash: file_hash.filter(|h| !h.is_empty()),
            last_synced: Utc::now(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.provider == Provider::Unknown
    }

    /// Whether the record was synced within `window` of `now`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let window = ChronoDuration::from_std(window).unwrap_or(ChronoDuration::MAX);
        now.signed_duration_since(self.last_synced) < window
    }

    pub fn entry_id(&self) -> Option<String> {
        self.entry.as_ref().map(|e| e.id())
    }

    pub fn civitai_model(&self) -> Option<&CivitaiModel> {
        self.entry.as_ref().and_then(CatalogEntry::as_civitai)
    }

    pub fn civitai_version(&self) -> Option<&CivitaiModelVersion> {
        match &self.variant {
            Some(CatalogVariant::Civitai(v)) => Some(v),
            _ => None,
        }
    }

    pub fn huggingface_model(&self) -> Option<&HuggingFaceModel> {
        self.entry.as_ref().and_then(CatalogEntry::as_huggingface)
    }

    /// Re-establish the provider/entry invariants on a record read from disk.
    pub(crate) fn enforce_invariants(&mut self) {
        match &self.entry {
            None => {
                self.provider = Provider::Unknown;
                self.variant = None;
                self.is_verified = false;
            }
            Some(entry) => {
                self.provider = entry.provider();
                if self
                    .variant
                    .as_ref()
                    .is_some_and(|v| v.provider() != self.provider)
                {
                    self.variant = None;
                }
            }
        }
        if self.filename.is_empty() {
            self.filename = file_name_of(&self.local_path);
        }
    }
}
