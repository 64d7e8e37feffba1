//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration and definition loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading configuration or definition documents.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File or directory being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file extension does not name a supported format.
    #[error("unsupported document format for {} (expected .yaml, .yml, or .json)", .path.display())]
    UnsupportedFormat {
        /// Offending file.
        path: PathBuf,
    },

    /// The document is not well-formed YAML or JSON, or does not match the expected shape.
    #[error("failed to parse {}: {reason}", .path.display())]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration `{field}`: {reason}")]
    Invalid {
        /// Dotted setting name, e.g. `template.max_partial_depth`.
        field: &'static str,
        /// Explanation.
        reason: String,
    },

    /// An environment override could not be applied.
    #[error("invalid override {key}={value}: {reason}")]
    InvalidOverride {
        /// Environment variable name.
        key: String,
        /// Raw value.
        value: String,
        /// Explanation.
        reason: String,
    },

    /// A prompt or schema definition violates a model invariant.
    #[error("invalid definition in {}: {reason}", .path.display())]
    Definition {
        /// File holding the definition.
        path: PathBuf,
        /// Explanation.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
