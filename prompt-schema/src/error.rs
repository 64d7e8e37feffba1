//! Schema error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// A single failed constraint, reported against one field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Dotted path of the offending field (`address.city`, `items[2].sku`).
    pub path: String,
    /// Constraint that failed, e.g. `required`, `type[integer]`, `range[13,120]`.
    pub constraint: String,
    /// Value observed at `path` (`null` when the field was absent).
    pub actual: Value,
    /// Human readable description.
    pub message: String,
}

impl Violation {
    pub(crate) fn new(
        path: impl Into<String>,
        constraint: impl Into<String>,
        actual: Value,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            constraint: constraint.into(),
            actual,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (constraint {}, actual {})",
            self.path, self.message, self.constraint, self.actual
        )
    }
}

/// Errors raised while defining schemas or validating values against them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    /// The schema definition itself is inconsistent.
    #[error("invalid schema `{schema}`: {reason}")]
    InvalidSchema {
        /// Schema name.
        schema: String,
        /// Explanation.
        reason: String,
    },

    /// A value failed validation. All violations found in one pass are listed.
    #[error("value does not satisfy schema `{schema}`: {}", summarize(.violations))]
    Validation {
        /// Schema name.
        schema: String,
        /// Every violation, in field declaration order.
        violations: Vec<Violation>,
    },

    /// A raw model response could not be parsed into structured data.
    #[error("response is not valid JSON: {reason}")]
    ResponseParse {
        /// Parser diagnostic.
        reason: String,
        /// Leading portion of the offending response.
        excerpt: String,
    },

    /// A schema name was not registered.
    #[error("unknown schema `{name}`")]
    UnknownSchema {
        /// Requested name.
        name: String,
    },

    /// A schema with the same name is already registered.
    #[error("schema `{name}` is already registered")]
    DuplicateSchema {
        /// Conflicting name.
        name: String,
    },
}

impl SchemaError {
    pub(crate) fn invalid(schema: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            schema: schema.to_owned(),
            reason: reason.into(),
        }
    }

    /// Returns the violations carried by a validation error.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation { violations, .. } => violations,
            _ => &[],
        }
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
