//! Template error types.

use thiserror::Error;

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while compiling or rendering templates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The template source is malformed (unterminated tag, bad nesting, ...).
    #[error("template syntax error at line {line}, column {column}: {message}")]
    Syntax {
        /// Description of the problem.
        message: String,
        /// 1-based line of the offending tag.
        line: usize,
        /// 1-based column of the offending tag.
        column: usize,
    },

    /// A referenced variable was absent while strict mode was on.
    #[error("missing template variable `{name}`")]
    MissingVariable {
        /// Path of the missing variable as written in the template.
        name: String,
    },

    /// A referenced partial was absent while strict mode was on.
    #[error("missing template partial `{name}`")]
    MissingPartial {
        /// Name of the missing partial.
        name: String,
    },

    /// Partial inclusion nested deeper than the configured limit.
    #[error("partial `{name}` exceeds maximum nesting depth of {limit}")]
    PartialDepthExceeded {
        /// Partial being included when the limit was hit.
        name: String,
        /// Configured limit.
        limit: usize,
    },
}

impl TemplateError {
    /// Returns `true` for compile-time errors.
    #[must_use]
    pub const fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }

    pub(crate) fn syntax(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = line_column(source, offset);
        Self::Syntax {
            message: message.into(),
            line,
            column,
        }
    }
}

fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.chars().count(), |idx| before[idx + 1..].chars().count())
        + 1;
    (line, column)
}
