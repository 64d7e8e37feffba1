//! Immutable history snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Prompt, PromptId, Version};

/// Immutable snapshot of a prompt at one version.
///
/// Snapshots expose no mutators; once committed to a version store they are
/// never rewritten.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptVersion {
    prompt_id: PromptId,
    version: Version,
    prompt: Prompt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    changelog: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_version: Option<Version>,
}

impl PromptVersion {
    /// Captures a snapshot of the supplied prompt, timestamped now.
    #[must_use]
    pub fn new(prompt: Prompt, changelog: Option<String>) -> Self {
        Self {
            prompt_id: prompt.id().clone(),
            version: prompt.version(),
            prompt,
            changelog,
            created_at: Utc::now(),
            created_by: None,
            parent_version: None,
        }
    }

    /// Records who produced the snapshot.
    #[must_use]
    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    /// Records the version this snapshot was derived from.
    #[must_use]
    pub fn with_parent_version(mut self, parent: Version) -> Self {
        self.parent_version = Some(parent);
        self
    }

    /// Overrides the creation timestamp.
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Returns the prompt identifier.
    #[must_use]
    pub fn prompt_id(&self) -> &PromptId {
        &self.prompt_id
    }

    /// Returns the snapshot version.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Returns the full prompt payload at this version.
    #[must_use]
    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    /// Returns the changelog note.
    #[must_use]
    pub fn changelog(&self) -> Option<&str> {
        self.changelog.as_deref()
    }

    /// Returns when the snapshot was taken.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns who produced the snapshot.
    #[must_use]
    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    /// Returns the version this snapshot was derived from.
    #[must_use]
    pub const fn parent_version(&self) -> Option<Version> {
        self.parent_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_copies_identity_from_prompt() {
        let prompt = Prompt::builder("greeting")
            .version("2.1.0")
            .text("Hello {{name}}!")
            .build()
            .unwrap();
        let snapshot = PromptVersion::new(prompt.clone(), Some("initial".into()))
            .with_created_by("alice")
            .with_parent_version(Version::new(2, 0, 0));

        assert_eq!(snapshot.prompt_id().as_str(), "greeting");
        assert_eq!(snapshot.version(), Version::new(2, 1, 0));
        assert_eq!(snapshot.prompt(), &prompt);
        assert_eq!(snapshot.changelog(), Some("initial"));
        assert_eq!(snapshot.created_by(), Some("alice"));
        assert_eq!(snapshot.parent_version(), Some(Version::new(2, 0, 0)));
    }
}
