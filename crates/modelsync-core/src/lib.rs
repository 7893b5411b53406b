//! Modelsync Core - Headless engine that identifies local model files.
//!
//! Given a local weights file (`.safetensors`, `.ckpt`, `.gguf`, ...), the
//! engine finds the catalog entry it came from on Civitai or HuggingFace,
//! records which release matched, discovers base-model / adapter
//! relationships, and keeps the result in a persisted cache so repeated
//! lookups are free.
//!
//! # Example
//!
//! ```rust,ignore
//! use modelsync_core::{MetadataManager, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> modelsync_core::Result<()> {
//!     let config = ResolverConfig::default().with_env_overrides();
//!     let manager = MetadataManager::from_config(config, "/data/model-metadata.json")?;
//!
//!     let record = manager
//!         .resolve("/models/cyberrealistic_v40.safetensors", false)
//!         .await?;
//!     println!("{} -> {:?}", record.filename, record.entry_id());
//!
//!     Ok(())
//! }
//! ```

pub mod atomic;
pub mod catalog;
pub mod config;
pub mod error;
pub mod hashing;
pub mod manager;
pub mod naming;
pub mod providers;
pub mod record;
pub mod relationships;
pub mod scoring;
pub mod store;

// Re-export commonly used types
pub use catalog::{CatalogEntry, CatalogModel, CatalogVariant, ModelKind, Provider};
pub use config::{ProviderOrder, ResolverConfig};
pub use error::{ModelSyncError, Result};
pub use hashing::FileHasher;
pub use manager::MetadataManager;
pub use providers::{CatalogProvider, CivitaiClient, HuggingFaceClient, ProviderCapabilities};
pub use record::{EnhancedMetadata, ModelFile, Relationships};
pub use relationships::RelationshipBuilder;
pub use store::{JsonFileBackend, MemoryBackend, MetadataStore, StoreBackend, StoreStats};
