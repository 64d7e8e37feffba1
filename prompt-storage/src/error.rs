//! Error types for storage backends.

use std::path::PathBuf;

use prompt_primitives::{PromptId, Version};
use thiserror::Error;

/// Errors emitted by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No stored prompt matched the request.
    #[error("prompt `{id}`{} not found in storage", .version.map(|v| format!(" version {v}")).unwrap_or_default())]
    NotFound {
        /// Requested identifier.
        id: PromptId,
        /// Requested version, `None` for "latest".
        version: Option<Version>,
    },
    /// Underlying I/O failure.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: serde_json::Error,
    },
    /// A stored record exists but cannot be interpreted.
    #[error("corrupt record at {}: {reason}", .path.display())]
    Corrupt {
        /// Location of the record.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },
    /// Backend-specific failure.
    #[error("storage backend error: {reason}")]
    Backend {
        /// Human-readable reason.
        reason: String,
    },
}

impl StorageError {
    /// Helper to construct backend errors from string-like values.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(id: &PromptId, version: Option<Version>) -> Self {
        Self::NotFound {
            id: id.clone(),
            version,
        }
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
