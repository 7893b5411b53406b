//! HuggingFace Hub API shapes.

use super::{CatalogFile, CatalogModel, FileHashes, ModelKind, Provider};
use serde::{Deserialize, Serialize};

/// Pipeline tags that mark a repo as an image-generation model.
pub const IMAGE_PIPELINE_TAGS: &[&str] = &[
    "text-to-image",
    "image-to-image",
    "unconditional-image-generation",
    "image-inpainting",
];

/// Qualifiers HF inserts between `base_model:` and the parent repo id.
const BASE_MODEL_RELATIONS: &[&str] = &["adapter", "finetune", "merge", "quantized"];

/// A model repository as returned by `/api/models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuggingFaceModel {
    /// Repo id, `author/name`.
    pub id: String,
    #[serde(rename = "modelId", default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub pipeline_tag: Option<String>,
    #[serde(default)]
    pub library_name: Option<String>,
    #[serde(rename = "lastModified", default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub siblings: Vec<HfSibling>,
}

/// A file inside a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HfSibling {
    pub rfilename: String,
}

impl HfSibling {
    /// Filename without any directory prefix.
    pub fn basename(&self) -> &str {
        self.rfilename.rsplit('/').next().unwrap_or(&self.rfilename)
    }
}

impl HuggingFaceModel {
    pub fn is_image_pipeline(&self) -> bool {
        self.pipeline_tag
            .as_deref()
            .map(|tag| IMAGE_PIPELINE_TAGS.contains(&tag))
            .unwrap_or(false)
    }

    fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Parent repo declared through a `base_model:` tag.
    ///
    /// HF writes both `base_model:org/name` and
    /// `base_model:adapter:org/name`; either form yields `org/name`.
    pub fn declared_parent(&self) -> Option<String> {
        self.tags.iter().find_map(|tag| {
            let rest = tag.strip_prefix("base_model:")?;
            let rest = match rest.split_once(':') {
                Some((relation, id)) if BASE_MODEL_RELATIONS.contains(&relation) => id,
                _ => rest,
            };
            (!rest.is_empty()).then(|| rest.to_string())
        })
    }
}

impl CatalogModel for HuggingFaceModel {
    fn provider(&self) -> Provider {
        Provider::HuggingFace
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }

    fn kind(&self) -> ModelKind {
        if self.has_tag("lora") || self.library_name.as_deref() == Some("peft") {
            ModelKind::Lora
        } else if self.has_tag("textual_inversion") || self.has_tag("embeddings") {
            ModelKind::Embedding
        } else if self.has_tag("controlnet") {
            ModelKind::Controlnet
        } else if self.is_image_pipeline() || self.library_name.as_deref() == Some("diffusers") {
            ModelKind::Checkpoint
        } else {
            ModelKind::Other
        }
    }

    fn creator(&self) -> Option<&str> {
        self.author
            .as_deref()
            .or_else(|| self.id.split_once('/').map(|(author, _)| author))
    }

    fn download_count(&self) -> u64 {
        self.downloads
    }

    fn like_count(&self) -> u64 {
        self.likes
    }

    fn rating(&self) -> Option<f64> {
        None
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn description(&self) -> Option<&str> {
        None
    }

    fn files(&self) -> Vec<CatalogFile> {
        self.siblings
            .iter()
            .map(|s| CatalogFile {
                name: s.basename().to_string(),
                hashes: FileHashes::default(),
            })
            .collect()
    }

    fn base_model(&self) -> Option<String> {
        self.declared_parent()
    }
}
