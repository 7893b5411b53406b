//! Persisted metadata cache keyed by local path.
//!
//! The on-disk document is
//! `{ "schemaVersion": 2, "records": { "<path>": EnhancedMetadata } }`.
//! Older layouts are migrated once at load:
//!
//! - v0: a bare map of path to record
//! - v1: the wrapped document with v1 records (optional `provider`,
//!   epoch-millisecond or absent `lastSynced`)
//!
//! A document that cannot be read degrades to an empty store.

use crate::atomic::{atomic_read_json, atomic_write_json};
use crate::catalog::Provider;
use crate::config::StoreConfig;
use crate::error::{ModelSyncError, Result};
use crate::record::EnhancedMetadata;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Durable surface the store reads from and writes to.
pub trait StoreBackend: Send + Sync {
    /// The raw stored document, `None` when nothing has been written yet.
    fn load(&self) -> Result<Option<Value>>;

    fn save(&self, document: &Value) -> Result<()>;

    /// Short label for log lines.
    fn describe(&self) -> String;
}

/// JSON file written with temp-file + rename.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backend at `<dir>/model-metadata.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(StoreConfig::DEFAULT_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<Value>> {
        atomic_read_json(&self.path)
    }

    fn save(&self, document: &Value) -> Result<()> {
        atomic_write_json(&self.path, document, true)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    document: Mutex<Option<Value>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

/// In-process backend. Clones share state, so a test can keep a handle and
/// count writes after handing the backend to a store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-seeded with a stored document.
    pub fn with_document(document: Value) -> Self {
        let backend = Self::default();
        if let Ok(mut guard) = backend.state.document.lock() {
            *guard = Some(document);
        }
        backend
    }

    /// Number of successful saves.
    pub fn persist_count(&self) -> usize {
        self.state.saves.load(Ordering::SeqCst)
    }

    /// Last saved document.
    pub fn document(&self) -> Option<Value> {
        self.state.document.lock().ok().and_then(|d| d.clone())
    }

    /// Make subsequent saves fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.state.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self) -> Result<Option<Value>> {
        Ok(self.document())
    }

    fn save(&self, document: &Value) -> Result<()> {
        if self.state.fail_saves.load(Ordering::SeqCst) {
            return Err(ModelSyncError::StoreIo {
                message: "memory backend rejected write".to_string(),
            });
        }
        let mut guard = self.state.document.lock().map_err(|_| ModelSyncError::StoreIo {
            message: "memory backend lock poisoned".to_string(),
        })?;
        *guard = Some(document.clone());
        self.state.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Record counts for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: usize,
    pub civitai: usize,
    pub huggingface: usize,
    pub unknown: usize,
    pub verified: usize,
    pub stale: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreDocument<'a> {
    schema_version: u32,
    records: BTreeMap<String, &'a EnhancedMetadata>,
}

/// In-memory record map over a [`StoreBackend`].
pub struct MetadataStore {
    backend: Box<dyn StoreBackend>,
    records: BTreeMap<PathBuf, EnhancedMetadata>,
}

impl std::fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataStore")
            .field("backend", &self.backend.describe())
            .field("records", &self.records.len())
            .finish()
    }
}

impl MetadataStore {
    /// Empty store; nothing is read until [`MetadataStore::load`].
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            records: BTreeMap::new(),
        }
    }

    /// Create a store and load whatever the backend holds.
    pub fn open(backend: impl StoreBackend + 'static) -> Self {
        let mut store = Self::new(backend);
        store.load();
        store
    }

    /// Replace the in-memory map with the backend's document.
    ///
    /// Unreadable documents and individual malformed records are logged and
    /// dropped. Returns the number of records loaded.
    pub fn load(&mut self) -> usize {
        self.records.clear();
        let document = match self.backend.load() {
            Ok(Some(document)) => document,
            Ok(None) => {
                debug!("No metadata store at {}", self.backend.describe());
                return 0;
            }
            Err(e) => {
                warn!(
                    "Failed to read metadata store {}, starting empty: {}",
                    self.backend.describe(),
                    e
                );
                return 0;
            }
        };

        let records = match migrate_document(document) {
            Some(records) => records,
            None => {
                warn!(
                    "Unrecognised metadata store layout in {}, starting empty",
                    self.backend.describe()
                );
                return 0;
            }
        };

        for (key, raw) in records {
            match serde_json::from_value::<EnhancedMetadata>(raw) {
                Ok(mut record) => {
                    let path = PathBuf::from(&key);
                    record.local_path = path.clone();
                    record.enforce_invariants();
                    self.records.insert(path, record);
                }
                Err(e) => warn!("Dropping unreadable record for {}: {}", key, e),
            }
        }

        info!(
            "Loaded {} metadata records from {}",
            self.records.len(),
            self.backend.describe()
        );
        self.records.len()
    }

    /// Write the full map to the backend.
    pub fn persist(&self) -> Result<()> {
        let document = StoreDocument {
            schema_version: StoreConfig::SCHEMA_VERSION,
            records: self
                .records
                .iter()
                .map(|(path, record)| (path.to_string_lossy().into_owned(), record))
                .collect(),
        };
        let value = serde_json::to_value(&document)?;
        self.backend
            .save(&value)
            .map_err(|e| ModelSyncError::StoreIo {
                message: format!("{}: {}", self.backend.describe(), e),
            })?;
        debug!("Persisted {} metadata records", self.records.len());
        Ok(())
    }

    pub fn get(&self, path: &Path) -> Option<&EnhancedMetadata> {
        self.records.get(path)
    }

    /// Insert or overwrite the record for its `local_path`.
    pub fn set(&mut self, record: EnhancedMetadata) {
        self.records.insert(record.local_path.clone(), record);
    }

    pub fn remove(&mut self, path: &Path) -> Option<EnhancedMetadata> {
        self.records.remove(path)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Whether a record exists and was synced within `window`.
    pub fn is_fresh(&self, path: &Path, window: Duration) -> bool {
        self.records
            .get(path)
            .is_some_and(|r| r.is_fresh_at(Utc::now(), window))
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.records.keys().cloned().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &EnhancedMetadata> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep only records for which `keep` returns true. Returns how many
    /// were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&Path, &EnhancedMetadata) -> bool) -> usize {
        let before = self.records.len();
        self.records.retain(|path, record| keep(path, record));
        before - self.records.len()
    }

    pub fn stats(&self, window: Duration) -> StoreStats {
        let now = Utc::now();
        let mut stats = StoreStats {
            total: self.records.len(),
            ..Default::default()
        };
        for record in self.records.values() {
            match record.provider {
                Provider::Civitai => stats.civitai += 1,
                Provider::HuggingFace => stats.huggingface += 1,
                Provider::Unknown => stats.unknown += 1,
            }
            if record.is_verified {
                stats.verified += 1;
            }
            if !record.is_fresh_at(now, window) {
                stats.stale += 1;
            }
        }
        stats
    }
}

/// Bring a stored document of any known version up to the current record
/// layout. Returns the raw record map, or `None` for an unusable document.
fn migrate_document(document: Value) -> Option<Map<String, Value>> {
    let Value::Object(mut root) = document else {
        return None;
    };

    let version = root.get("schemaVersion").and_then(Value::as_u64);
    let (version, mut records) = match version {
        None => {
            debug!("Migrating metadata store from v0");
            (0, root)
        }
        Some(v) => match root.remove("records") {
            Some(Value::Object(records)) => (v, records),
            Some(_) => return None,
            None => (v, Map::new()),
        },
    };

    if version > StoreConfig::SCHEMA_VERSION as u64 {
        warn!(
            "Metadata store schema v{} is newer than v{}, reading best-effort",
            version,
            StoreConfig::SCHEMA_VERSION
        );
    }

    if version < 2 {
        for (key, record) in records.iter_mut() {
            if let Value::Object(fields) = record {
                migrate_record_v1_to_v2(key, fields);
            }
        }
        info!("Migrated {} records to schema v2", records.len());
    }

    Some(records)
}

fn migrate_record_v1_to_v2(key: &str, fields: &mut Map<String, Value>) {
    if !fields.contains_key("localPath") {
        fields.insert("localPath".into(), Value::String(key.to_string()));
    }
    if !fields.contains_key("filename") {
        let filename = crate::naming::file_name_of(key);
        fields.insert("filename".into(), Value::String(filename));
    }

    let provider = fields
        .get("provider")
        .and_then(Value::as_str)
        .unwrap_or(Provider::Unknown.as_str())
        .to_string();
    fields.insert("provider".into(), Value::String(provider.clone()));

    let last_synced = match fields.get("lastSynced") {
        Some(Value::String(s)) if DateTime::parse_from_rfc3339(s).is_ok() => s.clone(),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            .to_rfc3339(),
        _ => DateTime::<Utc>::UNIX_EPOCH.to_rfc3339(),
    };
    fields.insert("lastSynced".into(), Value::String(last_synced));

    if provider == Provider::Unknown.as_str() {
        fields.remove("entry");
        fields.remove("variant");
        fields.insert("isVerified".into(), Value::Bool(false));
    }
}
