//! Integration tests for the modelsync binary.
//!
//! Every command here is answered from the local store, so no test talks to
//! a real catalog.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn store(&self) -> PathBuf {
        self.dir.path().join("model-metadata.json")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Run the binary against this environment's store and config.
    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_modelsync"))
            .arg("--store")
            .arg(self.store())
            .arg("--config")
            .arg(self.path("missing-config.json"))
            .args(args)
            .env_remove("CIVITAI_API_KEY")
            .env_remove("HF_TOKEN")
            .output()
            .expect("Failed to run modelsync")
    }

    fn run_json(&self, args: &[&str]) -> Value {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "modelsync {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
    }

    fn seed(&self, records: &[(&Path, Value)]) {
        let mut map = serde_json::Map::new();
        for (path, record) in records {
            map.insert(path.to_string_lossy().into_owned(), record.clone());
        }
        let document = json!({"schemaVersion": 2, "records": map});
        std::fs::write(self.store(), serde_json::to_vec_pretty(&document).unwrap()).unwrap();
    }
}

fn unknown_record(path: &Path) -> Value {
    json!({
        "localPath": path,
        "filename": path.file_name().unwrap().to_string_lossy(),
        "provider": "unknown",
        "isVerified": false,
        "lastSynced": "2026-01-01T00:00:00Z"
    })
}

#[test]
fn test_stats_on_empty_store() {
    let env = TestEnv::new();
    let stats = env.run_json(&["stats"]);
    assert_eq!(stats["total"], 0);
    assert_eq!(stats["unknown"], 0);
}

#[test]
fn test_resolve_rejects_non_model_file() {
    let env = TestEnv::new();
    let notes = env.path("notes.txt");
    std::fs::write(&notes, b"not weights").unwrap();

    let output = env.run(&["resolve", notes.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Not a model file"));
    assert!(!env.store().exists());
}

#[test]
fn test_show_reads_seeded_record() {
    let env = TestEnv::new();
    let model = env.path("mystery.safetensors");
    env.seed(&[(&model, unknown_record(&model))]);

    let record = env.run_json(&["show", model.to_str().unwrap()]);
    assert_eq!(record["filename"], "mystery.safetensors");
    assert_eq!(record["provider"], "unknown");

    let missing = env.run_json(&["show", env.path("other.safetensors").to_str().unwrap()]);
    assert!(missing.is_null());
}

#[test]
fn test_cleanup_and_remove() {
    let env = TestEnv::new();
    let model = env.path("keep.safetensors");
    let notes = env.path("notes.txt");
    env.seed(&[
        (&model, unknown_record(&model)),
        (&notes, unknown_record(&notes)),
    ]);

    let cleaned = env.run_json(&["cleanup"]);
    assert_eq!(cleaned["removed"], 1);
    assert_eq!(env.run_json(&["stats"])["total"], 1);

    let removed = env.run_json(&["remove", model.to_str().unwrap()]);
    assert_eq!(removed["removed"], true);
    let removed_again = env.run_json(&["remove", model.to_str().unwrap()]);
    assert_eq!(removed_again["removed"], false);
    assert_eq!(env.run_json(&["stats"])["total"], 0);
}

#[test]
fn test_clear_empties_store() {
    let env = TestEnv::new();
    let a = env.path("a.safetensors");
    let b = env.path("b.ckpt");
    env.seed(&[(&a, unknown_record(&a)), (&b, unknown_record(&b))]);
    assert_eq!(env.run_json(&["stats"])["total"], 2);

    let cleared = env.run_json(&["clear"]);
    assert_eq!(cleared["cleared"], true);
    assert_eq!(env.run_json(&["stats"])["total"], 0);
}

#[test]
fn test_scan_of_directory_without_models() {
    let env = TestEnv::new();
    let models = env.path("models");
    std::fs::create_dir_all(&models).unwrap();
    std::fs::write(models.join("README.md"), b"docs").unwrap();

    let results = env.run_json(&["scan", models.to_str().unwrap()]);
    assert_eq!(results, json!({}));
}

#[test]
fn test_invalid_provider_is_rejected() {
    let env = TestEnv::new();
    let output = env.run(&["resolve", "x.safetensors", "--provider", "nowhere"]);
    assert!(!output.status.success());
}
