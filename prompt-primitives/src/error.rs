//! Shared error definitions for prompt primitives.

use thiserror::Error;

/// Result alias used throughout the prompt data model.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while constructing or validating prompt primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The supplied prompt identifier failed validation.
    #[error("invalid prompt id `{id}`: {reason}")]
    InvalidPromptId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// The supplied version string is not a `major.minor.patch` triple.
    #[error("invalid version `{version}`: {reason}")]
    InvalidVersion {
        /// The offending version string.
        version: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// The prompt definition violated a structural invariant.
    #[error("invalid prompt `{id}`: {reason}")]
    InvalidPrompt {
        /// Identifier of the prompt being validated (may be empty when unknown).
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}

impl Error {
    pub(crate) fn invalid_prompt(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPrompt {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
