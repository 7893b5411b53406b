//! Error types for the modelsync engine.
//!
//! Only a few of these ever reach callers: `NotAModelFile` is fatal to a
//! single resolution, everything else raised inside a resolution is caught by
//! the orchestrator and degraded (a failed provider becomes "no results", a
//! failed hash becomes an empty hash, a failed persist is logged).

use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::Provider;

/// Main error type for the modelsync engine.
#[derive(Debug, Error)]
pub enum ModelSyncError {
    /// The path's extension is not in the recognised model-extension set.
    #[error("Not a model file: {0}")]
    NotAModelFile(PathBuf),

    // Network errors
    #[error("{provider} request failed{}: {message}", status_suffix(.status))]
    ProviderRequestFailed {
        provider: Provider,
        /// HTTP status, absent for transport faults
        status: Option<u16>,
        message: String,
    },

    #[error("Provider {0} does not support this operation")]
    UnsupportedProvider(Provider),

    // Hashing
    #[error("Failed to hash {path:?}: {message}")]
    HashComputationFailed {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Persistence
    #[error("Metadata store IO failed: {message}")]
    StoreIo { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Result type alias for modelsync operations.
pub type Result<T> = std::result::Result<T, ModelSyncError>;

impl From<std::io::Error> for ModelSyncError {
    fn from(err: std::io::Error) -> Self {
        ModelSyncError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ModelSyncError {
    fn from(err: serde_json::Error) -> Self {
        ModelSyncError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ModelSyncError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ModelSyncError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Wrap a reqwest transport error for the given provider.
    pub fn provider_transport(provider: Provider, err: reqwest::Error) -> Self {
        ModelSyncError::ProviderRequestFailed {
            provider,
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    /// HTTP status carried by a provider failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ModelSyncError::ProviderRequestFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// True for a provider response that reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelSyncError::NotAModelFile(PathBuf::from("/tmp/notes.txt"));
        assert_eq!(err.to_string(), "Not a model file: /tmp/notes.txt");

        let err = ModelSyncError::ProviderRequestFailed {
            provider: Provider::Civitai,
            status: Some(503),
            message: "Service Unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "civitai request failed (503): Service Unavailable"
        );
    }

    #[test]
    fn test_not_found_detection() {
        let err = ModelSyncError::ProviderRequestFailed {
            provider: Provider::Civitai,
            status: Some(404),
            message: "Not Found".into(),
        };
        assert!(err.is_not_found());
    }
}
