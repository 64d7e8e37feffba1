//! Error types for version stores.

use prompt_primitives::{PromptId, Version};
use thiserror::Error;

/// Errors emitted by version stores.
#[derive(Debug, Error)]
pub enum VersionStoreError {
    /// The `(id, version)` pair was already committed.
    #[error("version {version} of prompt `{id}` already exists")]
    Duplicate {
        /// Prompt identifier.
        id: PromptId,
        /// Conflicting version.
        version: Version,
    },
    /// No history entry matched the request.
    #[error("no version{} of prompt `{id}` has been committed", .version.map(|v| format!(" {v}")).unwrap_or_default())]
    NotFound {
        /// Prompt identifier.
        id: PromptId,
        /// Requested version, `None` for "latest".
        version: Option<Version>,
    },
    /// Underlying I/O failure while reading or writing the journal.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization error while encoding an entry.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: serde_json::Error,
    },
}

/// Result type alias for version store operations.
pub type VersionResult<T> = Result<T, VersionStoreError>;
