//! Prompt identifier types.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const MAX_ID_LEN: usize = 128;

/// Stable, unique identifier of a prompt.
///
/// Identifiers double as directory names for file-backed storage, so they are
/// restricted to ASCII alphanumerics, dash, underscore, and dot, and may not
/// start with a dot.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PromptId(String);

impl PromptId {
    /// Creates a new identifier after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPromptId`] if the identifier is empty, too long,
    /// starts with a dot, or contains unsupported characters.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_identifier(&id)?;
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PromptId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PromptId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PromptId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<PromptId> for String {
    fn from(value: PromptId) -> Self {
        value.0
    }
}

impl TryFrom<String> for PromptId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for PromptId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl FromStr for PromptId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

fn validate_identifier(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidPromptId {
            id: String::new(),
            reason: "identifier cannot be empty".into(),
        });
    }

    if id.len() > MAX_ID_LEN {
        return Err(Error::InvalidPromptId {
            id: id.into(),
            reason: format!("identifier length must be <= {MAX_ID_LEN}"),
        });
    }

    if id.starts_with('.') {
        return Err(Error::InvalidPromptId {
            id: id.into(),
            reason: "identifier cannot start with a dot".into(),
        });
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(Error::InvalidPromptId {
            id: id.into(),
            reason: "identifier must contain alphanumeric, dash, underscore, or dot".into(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_identifiers() {
        for id in ["greeting", "test_greeting", "summarize-v2", "support.triage"] {
            assert!(PromptId::new(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn rejects_path_like_identifiers() {
        for id in ["", "../etc", ".hidden", "a/b", "with space"] {
            let err = PromptId::new(id).expect_err("should be rejected");
            assert!(matches!(err, Error::InvalidPromptId { .. }));
        }
    }

    #[test]
    fn serde_rejects_invalid_ids() {
        let err = serde_json::from_str::<PromptId>("\"bad id\"");
        assert!(err.is_err());
        let ok: PromptId = serde_json::from_str("\"good_id\"").unwrap();
        assert_eq!(ok.as_str(), "good_id");
    }
}
