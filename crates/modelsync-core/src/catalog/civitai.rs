//! Civitai API shapes.
//!
//! Field names follow the public `/api/v1` payloads so the same structs
//! deserialize responses and round-trip through the metadata store.

use super::{CatalogFile, CatalogModel, FileHashes, ModelKind, Provider};
use serde::{Deserialize, Serialize};

/// A model (one catalog page) with all of its published versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CivitaiModel {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub model_type: String,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub creator: Option<CivitaiCreator>,
    #[serde(default)]
    pub stats: CivitaiStats,
    #[serde(default)]
    pub model_versions: Vec<CivitaiModelVersion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CivitaiCreator {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CivitaiStats {
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default)]
    pub thumbs_up_count: u64,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub rating_count: u64,
}

/// One release of a model. The by-hash endpoint returns a bare version
/// carrying `modelId`; versions nested in a model omit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CivitaiModelVersion {
    pub id: u64,
    #[serde(default)]
    pub model_id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_model: Option<String>,
    #[serde(default)]
    pub trained_words: Vec<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub files: Vec<CivitaiFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CivitaiFile {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(rename = "sizeKB", default)]
    pub size_kb: Option<f64>,
    #[serde(rename = "type", default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub primary: Option<bool>,
    #[serde(default)]
    pub hashes: CivitaiHashes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CivitaiHashes {
    #[serde(rename = "SHA256", default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(rename = "AutoV2", default, skip_serializing_if = "Option::is_none")]
    pub auto_v2: Option<String>,
    #[serde(rename = "BLAKE3", default, skip_serializing_if = "Option::is_none")]
    pub blake3: Option<String>,
    #[serde(rename = "AutoV1", default, skip_serializing_if = "Option::is_none")]
    pub auto_v1: Option<String>,
    #[serde(rename = "CRC32", default, skip_serializing_if = "Option::is_none")]
    pub crc32: Option<String>,
}

impl From<&CivitaiHashes> for FileHashes {
    fn from(h: &CivitaiHashes) -> Self {
        FileHashes {
            sha256: h.sha256.clone(),
            auto_v2: h.auto_v2.clone(),
            blake3: h.blake3.clone(),
            auto_v1: h.auto_v1.clone(),
            crc32: h.crc32.clone(),
        }
    }
}

impl CivitaiModel {
    /// First (most recent, canonical) version.
    pub fn latest_version(&self) -> Option<&CivitaiModelVersion> {
        self.model_versions.first()
    }

    pub fn version(&self, version_id: u64) -> Option<&CivitaiModelVersion> {
        self.model_versions.iter().find(|v| v.id == version_id)
    }
}

impl CatalogModel for CivitaiModel {
    fn provider(&self) -> Provider {
        Provider::Civitai
    }

    fn id(&self) -> String {
        self.id.to_string()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModelKind {
        ModelKind::from_civitai_type(&self.model_type)
    }

    fn creator(&self) -> Option<&str> {
        self.creator.as_ref().and_then(|c| c.username.as_deref())
    }

    fn download_count(&self) -> u64 {
        self.stats.download_count
    }

    fn like_count(&self) -> u64 {
        self.stats.favorite_count.max(self.stats.thumbs_up_count)
    }

    fn rating(&self) -> Option<f64> {
        self.stats.rating
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn files(&self) -> Vec<CatalogFile> {
        self.model_versions
            .iter()
            .flat_map(|v| v.files.iter())
            .map(|f| CatalogFile {
                name: f.name.clone(),
                hashes: FileHashes::from(&f.hashes),
            })
            .collect()
    }

    fn base_model(&self) -> Option<String> {
        self.model_versions
            .iter()
            .find_map(|v| v.base_model.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL_JSON: &str = r#"{
        "id": 4201,
        "name": "CyberRealistic",
        "type": "Checkpoint",
        "nsfw": false,
        "tags": ["photorealistic", "base model"],
        "creator": {"username": "Cyberdelia", "image": null},
        "stats": {"downloadCount": 812345, "favoriteCount": 12000, "commentCount": 320, "ratingCount": 900, "rating": 4.9},
        "modelVersions": [
            {
                "id": 9001,
                "name": "v4.0",
                "baseModel": "SD 1.5",
                "trainedWords": [],
                "files": [
                    {"id": 1, "name": "cyberrealistic_v40.safetensors", "sizeKB": 2082642.3, "type": "Model", "primary": true,
                     "hashes": {"AutoV2": "A1B2C3D4E5", "SHA256": "ABCDEF0123", "CRC32": "DEADBEEF"}}
                ]
            },
            {"id": 8001, "name": "v3.0", "baseModel": "SD 1.5", "files": []}
        ]
    }"#;

    #[test]
    fn test_parse_model_payload() {
        let model: CivitaiModel = serde_json::from_str(MODEL_JSON).unwrap();
        assert_eq!(model.id(), "4201");
        assert_eq!(model.kind(), ModelKind::Checkpoint);
        assert_eq!(model.creator(), Some("Cyberdelia"));
        assert_eq!(model.download_count(), 812_345);
        assert_eq!(model.rating(), Some(4.9));
        assert_eq!(model.base_model().as_deref(), Some("SD 1.5"));
        assert_eq!(model.latest_version().unwrap().id, 9001);
        assert!(model.version(8001).is_some());

        let files = model.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].hashes.sha256.as_deref(), Some("ABCDEF0123"));
    }

    #[test]
    fn test_minimal_payload_defaults() {
        let model: CivitaiModel = serde_json::from_str(r#"{"id": 1, "name": "bare"}"#).unwrap();
        assert_eq!(model.kind(), ModelKind::Other);
        assert_eq!(model.download_count(), 0);
        assert!(model.files().is_empty());
        assert!(model.base_model().is_none());
    }
}
