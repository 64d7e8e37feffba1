//! Storage collaborator contract.

use async_trait::async_trait;
use prompt_primitives::{Prompt, PromptFilter, PromptId, Version};

use crate::StorageResult;

/// Durable home of prompt revisions.
///
/// Backends store every saved `(id, version)` pair. Saving an existing pair
/// replaces it, which is how in-place corrections are persisted. Operations
/// taking `version: None` address the highest stored version (`load`,
/// `exists`) or every version (`delete`).
#[async_trait]
pub trait PromptStorage: Send + Sync {
    /// Persists `prompt` under its id and version.
    async fn save(&self, prompt: &Prompt) -> StorageResult<()>;

    /// Loads a specific version, or the highest stored version when `None`.
    async fn load(&self, id: &PromptId, version: Option<Version>) -> StorageResult<Prompt>;

    /// Deletes one version, or all versions when `None`. Returns `true` if
    /// anything was removed.
    async fn delete(&self, id: &PromptId, version: Option<Version>) -> StorageResult<bool>;

    /// Lists the highest stored version of every prompt matching `filter`,
    /// ordered by id.
    async fn list(&self, filter: &PromptFilter) -> StorageResult<Vec<Prompt>>;

    /// Returns `true` if the version (or any version when `None`) is stored.
    async fn exists(&self, id: &PromptId, version: Option<Version>) -> StorageResult<bool>;

    /// Returns every stored version of `id` in ascending order.
    async fn versions(&self, id: &PromptId) -> StorageResult<Vec<Version>>;
}
