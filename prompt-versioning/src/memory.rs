//! Volatile version store.

use async_trait::async_trait;
use prompt_primitives::{PromptId, PromptVersion, Version};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::VersionResult;
use crate::index::HistoryIndex;
use crate::store::VersionStore;

/// Version store keeping history in process memory.
#[derive(Debug, Default)]
pub struct InMemoryVersionStore {
    index: RwLock<HistoryIndex>,
}

impl InMemoryVersionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of snapshots across all prompts.
    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    /// Returns `true` if nothing has been committed.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    async fn append(&self, entry: PromptVersion) -> VersionResult<PromptVersion> {
        let mut guard = self.index.write().await;
        guard.insert(entry.clone())?;
        debug!(prompt_id = %entry.prompt_id(), version = %entry.version(), "version committed");
        Ok(entry)
    }

    async fn history(&self, id: &PromptId) -> VersionResult<Vec<PromptVersion>> {
        Ok(self.index.read().await.history(id))
    }

    async fn latest(&self, id: &PromptId) -> VersionResult<PromptVersion> {
        self.index.read().await.latest(id)
    }

    async fn get(&self, id: &PromptId, version: Version) -> VersionResult<PromptVersion> {
        self.index.read().await.get(id, version)
    }
}
