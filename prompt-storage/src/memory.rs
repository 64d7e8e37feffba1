//! Volatile storage backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use prompt_primitives::{Prompt, PromptFilter, PromptId, Version};
use tokio::sync::RwLock;

use crate::backend::PromptStorage;
use crate::error::{StorageError, StorageResult};

/// Storage retaining every revision in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    inner: RwLock<HashMap<PromptId, BTreeMap<Version, Prompt>>>,
}

impl InMemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct prompt ids held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl PromptStorage for InMemoryStorage {
    async fn save(&self, prompt: &Prompt) -> StorageResult<()> {
        let mut guard = self.inner.write().await;
        guard
            .entry(prompt.id().clone())
            .or_default()
            .insert(prompt.version(), prompt.clone());
        Ok(())
    }

    async fn load(&self, id: &PromptId, version: Option<Version>) -> StorageResult<Prompt> {
        let guard = self.inner.read().await;
        let revisions = guard.get(id);
        let found = match version {
            Some(version) => revisions.and_then(|revisions| revisions.get(&version)),
            None => revisions.and_then(|revisions| revisions.values().next_back()),
        };
        found
            .cloned()
            .ok_or_else(|| StorageError::not_found(id, version))
    }

    async fn delete(&self, id: &PromptId, version: Option<Version>) -> StorageResult<bool> {
        let mut guard = self.inner.write().await;
        let Some(version) = version else {
            return Ok(guard.remove(id).is_some());
        };
        let Some(revisions) = guard.get_mut(id) else {
            return Ok(false);
        };
        let removed = revisions.remove(&version).is_some();
        if revisions.is_empty() {
            guard.remove(id);
        }
        Ok(removed)
    }

    async fn list(&self, filter: &PromptFilter) -> StorageResult<Vec<Prompt>> {
        let guard = self.inner.read().await;
        let mut prompts: Vec<Prompt> = guard
            .values()
            .filter_map(|revisions| revisions.values().next_back())
            .filter(|prompt| filter.matches(prompt))
            .cloned()
            .collect();
        prompts.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(prompts)
    }

    async fn exists(&self, id: &PromptId, version: Option<Version>) -> StorageResult<bool> {
        let guard = self.inner.read().await;
        Ok(guard.get(id).is_some_and(|revisions| match version {
            Some(version) => revisions.contains_key(&version),
            None => !revisions.is_empty(),
        }))
    }

    async fn versions(&self, id: &PromptId) -> StorageResult<Vec<Version>> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(id)
            .map(|revisions| revisions.keys().copied().collect())
            .unwrap_or_default())
    }
}
