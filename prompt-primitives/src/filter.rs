//! Listing filters.

use serde::{Deserialize, Serialize};

use crate::{Prompt, PromptStatus};

/// Criteria for listing prompts. Empty criteria match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptFilter {
    /// Tags that must all be present.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Required status.
    #[serde(default)]
    pub status: Option<PromptStatus>,
    /// Required category.
    #[serde(default)]
    pub category: Option<String>,
}

impl PromptFilter {
    /// Creates a filter that matches every prompt.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the supplied tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Requires the supplied status.
    #[must_use]
    pub fn with_status(mut self, status: PromptStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Requires the supplied category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Returns `true` when the prompt satisfies every criterion.
    #[must_use]
    pub fn matches(&self, prompt: &Prompt) -> bool {
        if self.status.is_some_and(|status| status != prompt.status()) {
            return false;
        }
        if let Some(category) = &self.category
            && prompt.metadata().category.as_deref() != Some(category.as_str())
        {
            return false;
        }
        prompt.metadata().has_all_tags(&self.tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(status: PromptStatus, category: &str, tags: &[&str]) -> Prompt {
        let mut builder = Prompt::builder("p")
            .text("body")
            .status(status)
            .category(category);
        for tag in tags {
            builder = builder.tag(*tag);
        }
        builder.build().unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(PromptFilter::new().matches(&prompt(PromptStatus::Draft, "x", &[])));
    }

    #[test]
    fn all_criteria_must_hold() {
        let candidate = prompt(PromptStatus::Active, "support", &["email", "triage"]);
        let filter = PromptFilter::new()
            .with_status(PromptStatus::Active)
            .with_category("support")
            .with_tag("Email");
        assert!(filter.matches(&candidate));

        assert!(!filter.clone().with_tag("billing").matches(&candidate));
        assert!(
            !PromptFilter::new()
                .with_status(PromptStatus::Archived)
                .matches(&candidate)
        );
        assert!(
            !PromptFilter::new()
                .with_category("sales")
                .matches(&candidate)
        );
    }
}
