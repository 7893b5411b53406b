//! Command dispatch.

use crate::Command;
use anyhow::Result;
use modelsync_core::naming::is_model_file;
use modelsync_core::{EnhancedMetadata, MetadataManager};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub async fn run(manager: &MetadataManager, command: Command) -> Result<Value> {
    let output = match command {
        Command::Resolve {
            path,
            force,
            provider,
        } => {
            let path = absolute(&path)?;
            let record = match provider {
                Some(provider) => manager.resolve_with_provider(&path, provider, force).await?,
                None => manager.resolve(&path, force).await?,
            };
            serde_json::to_value(record)?
        }
        Command::Scan { paths } => {
            let files = collect_model_files(&paths)?;
            info!("Found {} model files", files.len());
            let results = manager.batch_resolve(&files).await;
            sorted(results)?
        }
        Command::Refresh { path, provider } => {
            let results = match (path, provider) {
                (Some(path), _) => manager.refresh(Some(&absolute(&path)?)).await?,
                (None, Some(provider)) => manager.refresh_all(Some(provider)).await,
                (None, None) => manager.refresh(None).await?,
            };
            sorted(results)?
        }
        Command::Show { path } => match manager.get_cached(absolute(&path)?) {
            Some(record) => serde_json::to_value(record)?,
            None => Value::Null,
        },
        Command::Related { path } => {
            let related = manager.get_relationships(absolute(&path)?);
            serde_json::to_value(related)?
        }
        Command::Stats => serde_json::to_value(manager.stats())?,
        Command::Remove { path } => {
            let removed = manager.remove(absolute(&path)?)?;
            json!({ "removed": removed.is_some() })
        }
        Command::Cleanup => json!({ "removed": manager.cleanup_non_model_entries()? }),
        Command::Clear => {
            manager.clear_cache()?;
            json!({ "cleared": true })
        }
    };
    Ok(output)
}

/// Store keys are absolute paths.
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Expand directories into the model files they contain.
fn collect_model_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let path = absolute(path)?;
        if path.is_dir() {
            for entry in WalkDir::new(&path).follow_links(true) {
                match entry {
                    Ok(entry) if entry.file_type().is_file() && is_model_file(entry.path()) => {
                        files.push(entry.into_path());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Skipping unreadable entry under {}: {}", path.display(), e),
                }
            }
        } else {
            files.push(path);
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn sorted(results: HashMap<PathBuf, EnhancedMetadata>) -> Result<Value> {
    let ordered: BTreeMap<String, EnhancedMetadata> = results
        .into_iter()
        .map(|(path, record)| (path.to_string_lossy().into_owned(), record))
        .collect();
    Ok(serde_json::to_value(ordered)?)
}
