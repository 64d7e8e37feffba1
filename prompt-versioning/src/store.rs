//! Version store contract.

use async_trait::async_trait;
use prompt_primitives::{Prompt, PromptId, PromptVersion, Version};

use crate::VersionResult;

/// Append-only history of immutable prompt snapshots.
///
/// Implementations must make the duplicate check and the append a single
/// indivisible step: of two concurrent appends for the same `(id, version)`
/// exactly one succeeds and the other observes
/// [`VersionStoreError::Duplicate`](crate::VersionStoreError::Duplicate).
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Appends a snapshot. Existing entries are never replaced.
    async fn append(&self, entry: PromptVersion) -> VersionResult<PromptVersion>;

    /// Returns every snapshot of `id` in commit order; empty for unknown ids.
    async fn history(&self, id: &PromptId) -> VersionResult<Vec<PromptVersion>>;

    /// Returns the most recently committed snapshot of `id`.
    async fn latest(&self, id: &PromptId) -> VersionResult<PromptVersion>;

    /// Returns the snapshot of `id` at `version`.
    async fn get(&self, id: &PromptId, version: Version) -> VersionResult<PromptVersion>;

    /// Returns `true` if `(id, version)` has been committed.
    async fn contains(&self, id: &PromptId, version: Version) -> VersionResult<bool> {
        match self.get(id, version).await {
            Ok(_) => Ok(true),
            Err(crate::VersionStoreError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Snapshots `prompt` with an optional changelog note and appends it.
    async fn commit(&self, prompt: Prompt, changelog: Option<String>) -> VersionResult<PromptVersion> {
        self.append(PromptVersion::new(prompt, changelog)).await
    }
}
