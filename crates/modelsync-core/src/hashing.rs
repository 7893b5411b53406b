//! Content fingerprints for local model files.
//!
//! Small files are digested in full. Multi-gigabyte checkpoints only get
//! their head and tail sampled, which keeps a batch scan from reading every
//! byte of a model library while still telling files apart in practice.
//! Digests are SHA-256 rendered as uppercase hex, the form Civitai's
//! by-hash index uses.

use crate::config::HashingConfig;
use crate::error::{ModelSyncError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How a digest was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashMode {
    Full,
    Sampled,
}

/// File hasher with a size threshold for switching to sampled digests.
#[derive(Debug, Clone)]
pub struct FileHasher {
    full_hash_threshold: u64,
    sample_size: usize,
}

impl Default for FileHasher {
    fn default() -> Self {
        Self {
            full_hash_threshold: HashingConfig::FULL_HASH_THRESHOLD,
            sample_size: HashingConfig::SAMPLE_SIZE,
        }
    }
}

impl FileHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the threshold and sample size.
    pub fn with_limits(full_hash_threshold: u64, sample_size: usize) -> Self {
        Self {
            full_hash_threshold,
            sample_size: sample_size.max(1),
        }
    }

    /// Which mode a file of `size` bytes is hashed with.
    pub fn mode_for(&self, size: u64) -> HashMode {
        if size < self.full_hash_threshold {
            HashMode::Full
        } else {
            HashMode::Sampled
        }
    }

    /// Best-effort hash: an unreadable file yields an empty string.
    pub fn hash(&self, path: impl AsRef<Path>) -> String {
        let path = path.as_ref();
        match self.try_hash(path) {
            Ok(digest) => digest,
            Err(e) => {
                warn!("Hashing skipped for {}: {}", path.display(), e);
                String::new()
            }
        }
    }

    /// Hash on the blocking pool so the async caller is not stalled by disk IO.
    pub async fn hash_async(&self, path: impl Into<PathBuf>) -> String {
        let path = path.into();
        let hasher = self.clone();
        let task_path = path.clone();
        match tokio::task::spawn_blocking(move || hasher.hash(&task_path)).await {
            Ok(digest) => digest,
            Err(e) => {
                warn!("Hash task for {} failed: {}", path.display(), e);
                String::new()
            }
        }
    }

    /// Compute the digest, surfacing IO failures.
    pub fn try_hash(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let fail = |e: std::io::Error| ModelSyncError::HashComputationFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
            source: Some(e),
        };

        let mut file = File::open(path).map_err(fail)?;
        let size = file.metadata().map_err(fail)?.len();

        let digest = match self.mode_for(size) {
            HashMode::Full => digest_full(&mut file).map_err(fail)?,
            HashMode::Sampled => self.digest_sampled(&mut file, size).map_err(fail)?,
        };

        debug!(
            "Hashed {} ({} bytes, {:?})",
            path.display(),
            size,
            self.mode_for(size)
        );
        Ok(digest)
    }

    fn digest_sampled(&self, file: &mut File, size: u64) -> std::io::Result<String> {
        let sample = self.sample_size as u64;
        let mut hasher = Sha256::new();

        let head_len = sample.min(size) as usize;
        let mut buffer = vec![0u8; head_len];
        file.read_exact(&mut buffer)?;
        hasher.update(&buffer);

        // Tail only when it cannot overlap the head
        if size >= sample * 2 {
            file.seek(SeekFrom::Start(size - sample))?;
            let mut tail = vec![0u8; self.sample_size];
            file.read_exact(&mut tail)?;
            hasher.update(&tail);
        }

        Ok(hex::encode_upper(hasher.finalize()))
    }
}

fn digest_full(file: &mut File) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HashingConfig::READ_BUFFER_SIZE];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hex::encode_upper(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_empty_file_digest() {
        let file = NamedTempFile::new().unwrap();
        assert_eq!(
            FileHasher::new().hash(file.path()),
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        );
    }

    #[test]
    fn test_full_hash_is_deterministic_uppercase() {
        let a = file_with(b"checkpoint bytes");
        let b = file_with(b"checkpoint bytes");
        let hasher = FileHasher::new();

        let digest = hasher.hash(a.path());
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, digest.to_uppercase());
        assert_eq!(digest, hasher.hash(b.path()));
        assert_ne!(digest, hasher.hash(file_with(b"other bytes").path()));
    }

    #[test]
    fn test_sampled_hash_only_depends_on_head_and_tail() {
        let hasher = FileHasher::with_limits(64, 8);
        assert_eq!(hasher.mode_for(128), HashMode::Sampled);

        let mut first = vec![7u8; 128];
        let mut second = vec![7u8; 128];
        first[60] = 1;
        second[60] = 2;
        assert_eq!(
            hasher.hash(file_with(&first).path()),
            hasher.hash(file_with(&second).path())
        );

        second[125] = 9;
        assert_ne!(
            hasher.hash(file_with(&first).path()),
            hasher.hash(file_with(&second).path())
        );
    }

    #[test]
    fn test_sampled_differs_from_full() {
        let bytes = vec![3u8; 100];
        let sampled = FileHasher::with_limits(50, 8).hash(file_with(&bytes).path());
        let full = FileHasher::with_limits(1000, 8).hash(file_with(&bytes).path());
        assert_ne!(sampled, full);
    }

    #[test]
    fn test_missing_file_yields_empty_string() {
        let hasher = FileHasher::new();
        assert_eq!(hasher.hash("/definitely/not/here.safetensors"), "");
        assert!(matches!(
            hasher.try_hash("/definitely/not/here.safetensors"),
            Err(ModelSyncError::HashComputationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_hash_async_matches_sync() {
        let file = file_with(b"async bytes");
        let hasher = FileHasher::new();
        assert_eq!(hasher.hash_async(file.path()).await, hasher.hash(file.path()));
    }
}
