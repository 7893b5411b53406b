//! Catalog entry types shared by every provider.
//!
//! Each catalog has its own payload shape ([`CivitaiModel`],
//! [`HuggingFaceModel`]). Consumers work with the tagged [`CatalogEntry`]
//! and the [`CatalogModel`] view it implements, so provider-specific
//! branching stays inside this module and the provider clients.

mod civitai;
mod family;
mod huggingface;

pub use civitai::{
    CivitaiCreator, CivitaiFile, CivitaiHashes, CivitaiModel, CivitaiModelVersion, CivitaiStats,
};
pub use family::{infer_base_model_family, family_search_term};
pub use huggingface::{HfSibling, HuggingFaceModel, IMAGE_PIPELINE_TAGS};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog a record was resolved against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Civitai,
    #[serde(rename = "huggingface")]
    HuggingFace,
    #[default]
    Unknown,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Civitai => "civitai",
            Provider::HuggingFace => "huggingface",
            Provider::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "civitai" => Ok(Provider::Civitai),
            "huggingface" | "hf" => Ok(Provider::HuggingFace),
            "unknown" => Ok(Provider::Unknown),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Coarse category of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Full base model / checkpoint.
    Checkpoint,
    /// LoRA-style adapter (LoRA, LoCon, DoRA, LyCORIS).
    Lora,
    Embedding,
    Vae,
    Controlnet,
    Other,
}

impl ModelKind {
    pub fn from_civitai_type(model_type: &str) -> Self {
        match model_type.to_ascii_lowercase().as_str() {
            "checkpoint" => ModelKind::Checkpoint,
            "lora" | "locon" | "dora" | "lycoris" => ModelKind::Lora,
            "textualinversion" => ModelKind::Embedding,
            "vae" => ModelKind::Vae,
            "controlnet" => ModelKind::Controlnet,
            _ => ModelKind::Other,
        }
    }

    /// Value for Civitai's `types` query parameter.
    pub fn civitai_type(&self) -> Option<&'static str> {
        match self {
            ModelKind::Checkpoint => Some("Checkpoint"),
            ModelKind::Lora => Some("LORA"),
            ModelKind::Embedding => Some("TextualInversion"),
            ModelKind::Vae => Some("VAE"),
            ModelKind::Controlnet => Some("Controlnet"),
            ModelKind::Other => None,
        }
    }

    /// Value for HuggingFace's `filter` query parameter.
    pub fn huggingface_filter(&self) -> Option<&'static str> {
        match self {
            ModelKind::Checkpoint => Some("diffusers"),
            ModelKind::Lora => Some("lora"),
            ModelKind::Embedding => Some("textual_inversion"),
            ModelKind::Controlnet => Some("controlnet"),
            ModelKind::Vae | ModelKind::Other => None,
        }
    }
}

/// Content hashes published for a catalog file, by algorithm.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileHashes {
    pub sha256: Option<String>,
    pub auto_v2: Option<String>,
    pub blake3: Option<String>,
    pub auto_v1: Option<String>,
    pub crc32: Option<String>,
}

impl FileHashes {
    /// Hashes in match-priority order.
    pub fn in_priority_order(&self) -> impl Iterator<Item = &str> {
        [
            &self.sha256,
            &self.auto_v2,
            &self.blake3,
            &self.auto_v1,
            &self.crc32,
        ]
        .into_iter()
        .filter_map(|h| h.as_deref())
        .filter(|h| !h.is_empty())
    }

    /// Whether any published hash identifies `digest`.
    ///
    /// AutoV2 is the first ten hex characters of the SHA-256, so a full
    /// digest also matches a published AutoV2 prefix.
    pub fn matches(&self, digest: &str) -> bool {
        if digest.is_empty() {
            return false;
        }
        self.in_priority_order().any(|published| {
            published.eq_ignore_ascii_case(digest)
                || (published.len() == 10
                    && digest.len() == 64
                    && digest
                        .get(..10)
                        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(published)))
        })
    }
}

/// A downloadable file inside a catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogFile {
    pub name: String,
    pub hashes: FileHashes,
}

/// Provider-independent view of a catalog entry.
pub trait CatalogModel {
    fn provider(&self) -> Provider;
    fn id(&self) -> String;
    /// Display name used for fuzzy matching.
    fn name(&self) -> &str;
    fn kind(&self) -> ModelKind;
    fn creator(&self) -> Option<&str>;
    fn download_count(&self) -> u64;
    /// Favorites on Civitai, likes on HuggingFace.
    fn like_count(&self) -> u64;
    /// Civitai's 0-5 rating; HuggingFace has none.
    fn rating(&self) -> Option<f64>;
    fn tags(&self) -> &[String];
    fn description(&self) -> Option<&str>;
    fn files(&self) -> Vec<CatalogFile>;
    /// Base-model family label or declared parent, when the catalog states one.
    fn base_model(&self) -> Option<String>;
}

/// A catalog entry from either provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogEntry {
    Civitai(CivitaiModel),
    #[serde(rename = "huggingface")]
    HuggingFace(HuggingFaceModel),
}

impl CatalogEntry {
    pub fn as_model(&self) -> &dyn CatalogModel {
        match self {
            CatalogEntry::Civitai(m) => m,
            CatalogEntry::HuggingFace(m) => m,
        }
    }

    pub fn as_civitai(&self) -> Option<&CivitaiModel> {
        match self {
            CatalogEntry::Civitai(m) => Some(m),
            CatalogEntry::HuggingFace(_) => None,
        }
    }

    pub fn as_huggingface(&self) -> Option<&HuggingFaceModel> {
        match self {
            CatalogEntry::HuggingFace(m) => Some(m),
            CatalogEntry::Civitai(_) => None,
        }
    }

    /// Sub-releases that can be matched against a local file.
    pub fn variants(&self) -> Vec<CatalogVariant> {
        match self {
            CatalogEntry::Civitai(m) => m
                .model_versions
                .iter()
                .cloned()
                .map(CatalogVariant::Civitai)
                .collect(),
            CatalogEntry::HuggingFace(m) => m
                .siblings
                .iter()
                .cloned()
                .map(CatalogVariant::HuggingFace)
                .collect(),
        }
    }
}

impl CatalogModel for CatalogEntry {
    fn provider(&self) -> Provider {
        self.as_model().provider()
    }
    fn id(&self) -> String {
        self.as_model().id()
    }
    fn name(&self) -> &str {
        self.as_model().name()
    }
    fn kind(&self) -> ModelKind {
        self.as_model().kind()
    }
    fn creator(&self) -> Option<&str> {
        self.as_model().creator()
    }
    fn download_count(&self) -> u64 {
        self.as_model().download_count()
    }
    fn like_count(&self) -> u64 {
        self.as_model().like_count()
    }
    fn rating(&self) -> Option<f64> {
        self.as_model().rating()
    }
    fn tags(&self) -> &[String] {
        self.as_model().tags()
    }
    fn description(&self) -> Option<&str> {
        self.as_model().description()
    }
    fn files(&self) -> Vec<CatalogFile> {
        self.as_model().files()
    }
    fn base_model(&self) -> Option<String> {
        self.as_model().base_model()
    }
}

impl From<CivitaiModel> for CatalogEntry {
    fn from(model: CivitaiModel) -> Self {
        CatalogEntry::Civitai(model)
    }
}

impl From<HuggingFaceModel> for CatalogEntry {
    fn from(model: HuggingFaceModel) -> Self {
        CatalogEntry::HuggingFace(model)
    }
}

/// The specific release inside an entry that a local file corresponds to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogVariant {
    Civitai(CivitaiModelVersion),
    #[serde(rename = "huggingface")]
    HuggingFace(HfSibling),
}

impl CatalogVariant {
    pub fn provider(&self) -> Provider {
        match self {
            CatalogVariant::Civitai(_) => Provider::Civitai,
            CatalogVariant::HuggingFace(_) => Provider::HuggingFace,
        }
    }

    /// Files that belong to this variant.
    pub fn files(&self) -> Vec<CatalogFile> {
        match self {
            CatalogVariant::Civitai(v) => v
                .files
                .iter()
                .map(|f| CatalogFile {
                    name: f.name.clone(),
                    hashes: FileHashes::from(&f.hashes),
                })
                .collect(),
            CatalogVariant::HuggingFace(s) => vec![CatalogFile {
                name: s.basename().to_string(),
                hashes: FileHashes::default(),
            }],
        }
    }
}

/// Parameters for a relationship lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedQuery {
    pub kind: ModelKind,
    /// Base-model family label, e.g. `SDXL 1.0`.
    pub family: String,
    pub limit: u32,
}
