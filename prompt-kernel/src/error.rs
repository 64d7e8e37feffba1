//! Unified error taxonomy surfaced by the prompt manager.

use prompt_primitives::{PromptId, Version};
use prompt_schema::{SchemaError, Violation};
use prompt_storage::StorageError;
use prompt_template::TemplateError;
use prompt_versioning::VersionStoreError;
use thiserror::Error;

/// Result alias for manager operations.
pub type PromptResult<T> = Result<T, PromptError>;

/// Errors returned by [`PromptManager`](crate::PromptManager) operations.
///
/// Every variant carries the identifiers needed to build an actionable
/// message without consulting a backtrace.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PromptError {
    /// No current prompt exists under the identifier.
    #[error("prompt `{id}` not found")]
    PromptNotFound {
        /// Requested identifier.
        id: PromptId,
    },

    /// The requested version does not exist, or no history was committed.
    #[error("version {} of prompt `{id}` not found", .version.map_or_else(|| "(latest)".to_owned(), |v| v.to_string()))]
    VersionNotFound {
        /// Prompt identifier.
        id: PromptId,
        /// Requested version; `None` when asking for the latest entry.
        version: Option<Version>,
    },

    /// The `(id, version)` pair was already committed.
    #[error("version {version} of prompt `{id}` already exists")]
    DuplicateVersion {
        /// Prompt identifier.
        id: PromptId,
        /// Conflicting version.
        version: Version,
    },

    /// A template owned by the prompt does not compile.
    #[error("template of prompt `{id}` is malformed: {source}")]
    TemplateSyntax {
        /// Prompt identifier.
        id: PromptId,
        /// Compiler diagnostic.
        source: TemplateError,
    },

    /// Rendering failed (missing variable or partial in strict mode, runaway partial recursion).
    #[error("failed to render prompt `{id}` version {version}: {source}")]
    TemplateRender {
        /// Prompt identifier.
        id: PromptId,
        /// Version being rendered.
        version: Version,
        /// Renderer diagnostic.
        source: TemplateError,
    },

    /// A value failed schema validation; every violation is listed.
    #[error(
        "schema `{schema}` rejected {}{}",
        .prompt_id.as_ref().map_or_else(String::new, |id| format!("value for prompt `{id}`: ")),
        .violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    SchemaValidation {
        /// Prompt whose input or output was validated, when known.
        prompt_id: Option<PromptId>,
        /// Schema name.
        schema: String,
        /// Per-field violations.
        violations: Vec<Violation>,
    },

    /// A raw model response was not structured data.
    #[error("model response is not valid JSON: {reason}")]
    ResponseParse {
        /// Prompt whose response was parsed, when known.
        prompt_id: Option<PromptId>,
        /// Parser diagnostic.
        reason: String,
        /// Leading portion of the response.
        excerpt: String,
    },

    /// A blocking call was made from inside a running async runtime.
    #[error("blocking `{operation}` called from within an async runtime; await the async method instead")]
    NestedScheduler {
        /// Name of the manager operation.
        operation: &'static str,
    },

    /// The requested version does not follow the current one.
    #[error("version {requested} of prompt `{id}` conflicts with current version {current}")]
    VersionConflict {
        /// Prompt identifier.
        id: PromptId,
        /// Current registry version.
        current: Version,
        /// Version named by the caller.
        requested: Version,
    },

    /// The prompt definition violates a model invariant.
    #[error("invalid prompt `{id}`: {reason}")]
    InvalidPrompt {
        /// Identifier as supplied (may be malformed).
        id: String,
        /// Explanation.
        reason: String,
    },

    /// A referenced schema is not registered.
    #[error("unknown schema `{name}`")]
    UnknownSchema {
        /// Schema name.
        name: String,
    },

    /// A schema definition is inconsistent or conflicts with a registered one.
    #[error("invalid schema `{schema}`: {reason}")]
    InvalidSchema {
        /// Schema name.
        schema: String,
        /// Explanation.
        reason: String,
    },

    /// The storage or version store backend failed.
    #[error("storage failure: {reason}")]
    Storage {
        /// Backend diagnostic.
        reason: String,
    },

    /// Manager configuration is invalid or its backends could not be opened.
    #[error("invalid manager configuration: {reason}")]
    Config {
        /// Explanation.
        reason: String,
    },

    /// The runtime driving a mutation could not run it to completion.
    #[error("execution scheduler unavailable: {reason}")]
    SchedulerUnavailable {
        /// Explanation.
        reason: String,
    },

    /// No plugin is registered under the name.
    #[error("plugin `{name}` not found")]
    PluginNotFound {
        /// Requested plugin name.
        name: String,
    },

    /// A plugin rejected or failed to convert a rendered prompt.
    #[error("plugin `{name}` failed: {reason}")]
    Plugin {
        /// Plugin name.
        name: String,
        /// Plugin diagnostic.
        reason: String,
    },
}

/// Discriminant of [`PromptError`], comparable across calling conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ErrorKind {
    PromptNotFound,
    VersionNotFound,
    DuplicateVersion,
    TemplateSyntax,
    TemplateRender,
    SchemaValidation,
    ResponseParse,
    NestedScheduler,
    VersionConflict,
    InvalidPrompt,
    UnknownSchema,
    InvalidSchema,
    Storage,
    Config,
    SchedulerUnavailable,
    PluginNotFound,
    Plugin,
}

impl PromptError {
    /// Returns the error discriminant.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PromptNotFound { .. } => ErrorKind::PromptNotFound,
            Self::VersionNotFound { .. } => ErrorKind::VersionNotFound,
            Self::DuplicateVersion { .. } => ErrorKind::DuplicateVersion,
            Self::TemplateSyntax { .. } => ErrorKind::TemplateSyntax,
            Self::TemplateRender { .. } => ErrorKind::TemplateRender,
            Self::SchemaValidation { .. } => ErrorKind::SchemaValidation,
            Self::ResponseParse { .. } => ErrorKind::ResponseParse,
            Self::NestedScheduler { .. } => ErrorKind::NestedScheduler,
            Self::VersionConflict { .. } => ErrorKind::VersionConflict,
            Self::InvalidPrompt { .. } => ErrorKind::InvalidPrompt,
            Self::UnknownSchema { .. } => ErrorKind::UnknownSchema,
            Self::InvalidSchema { .. } => ErrorKind::InvalidSchema,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Config { .. } => ErrorKind::Config,
            Self::SchedulerUnavailable { .. } => ErrorKind::SchedulerUnavailable,
            Self::PluginNotFound { .. } => ErrorKind::PluginNotFound,
            Self::Plugin { .. } => ErrorKind::Plugin,
        }
    }

    /// Returns the violations carried by a schema validation error.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::SchemaValidation { violations, .. } => violations,
            _ => &[],
        }
    }

    /// Attaches a prompt identifier to schema-related errors that lack one.
    #[must_use]
    pub(crate) fn for_prompt(mut self, id: &PromptId) -> Self {
        match &mut self {
            Self::SchemaValidation { prompt_id, .. } | Self::ResponseParse { prompt_id, .. }
                if prompt_id.is_none() =>
            {
                *prompt_id = Some(id.clone());
            }
            _ => {}
        }
        self
    }

    pub(crate) fn not_found(id: &PromptId) -> Self {
        Self::PromptNotFound { id: id.clone() }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

impl From<prompt_primitives::Error> for PromptError {
    fn from(err: prompt_primitives::Error) -> Self {
        match err {
            prompt_primitives::Error::InvalidPromptId { id, reason }
            | prompt_primitives::Error::InvalidPrompt { id, reason } => {
                Self::InvalidPrompt { id, reason }
            }
            prompt_primitives::Error::InvalidVersion { version, reason } => Self::InvalidPrompt {
                id: String::new(),
                reason: format!("invalid version `{version}`: {reason}"),
            },
        }
    }
}

impl From<SchemaError> for PromptError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Validation { schema, violations } => Self::SchemaValidation {
                prompt_id: None,
                schema,
                violations,
            },
            SchemaError::ResponseParse { reason, excerpt } => Self::ResponseParse {
                prompt_id: None,
                reason,
                excerpt,
            },
            SchemaError::UnknownSchema { name } => Self::UnknownSchema { name },
            SchemaError::InvalidSchema { schema, reason } => Self::InvalidSchema { schema, reason },
            SchemaError::DuplicateSchema { name } => Self::InvalidSchema {
                schema: name,
                reason: "a schema with this name is already registered".to_owned(),
            },
        }
    }
}

impl From<StorageError> for PromptError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id, version: None } => Self::PromptNotFound { id },
            StorageError::NotFound {
                id,
                version: Some(version),
            } => Self::VersionNotFound {
                id,
                version: Some(version),
            },
            other => Self::Storage {
                reason: other.to_string(),
            },
        }
    }
}

impl From<VersionStoreError> for PromptError {
    fn from(err: VersionStoreError) -> Self {
        match err {
            VersionStoreError::Duplicate { id, version } => Self::DuplicateVersion { id, version },
            VersionStoreError::NotFound { id, version } => Self::VersionNotFound { id, version },
            other => Self::Storage {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn id() -> PromptId {
        PromptId::new("greeting").unwrap()
    }

    #[test]
    fn storage_not_found_maps_by_version() {
        let err: PromptError = StorageError::NotFound {
            id: id(),
            version: None,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::PromptNotFound);

        let err: PromptError = StorageError::NotFound {
            id: id(),
            version: Some(Version::new(2, 0, 0)),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::VersionNotFound);
    }

    #[test]
    fn duplicate_commit_maps_to_duplicate_version() {
        let err: PromptError = VersionStoreError::Duplicate {
            id: id(),
            version: Version::new(1, 0, 0),
        }
        .into();
        assert_eq!(
            err,
            PromptError::DuplicateVersion {
                id: id(),
                version: Version::new(1, 0, 0)
            }
        );
    }

    #[test]
    fn schema_errors_gain_prompt_context() {
        let err: PromptError = SchemaError::Validation {
            schema: "user".into(),
            violations: vec![Violation {
                path: "age".into(),
                constraint: "range[13,120]".into(),
                actual: json!(200),
                message: "200 is outside range[13,120]".into(),
            }],
        }
        .into();
        let err = err.for_prompt(&id());
        assert_eq!(err.violations().len(), 1);
        let message = err.to_string();
        assert!(message.contains("prompt `greeting`"), "{message}");
        assert!(message.contains("range[13,120]"), "{message}");
    }
}
