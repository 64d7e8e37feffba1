//! In-memory index of current prompts, written through to a storage backend.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use prompt_primitives::{Prompt, PromptFilter, PromptId, Version};
use prompt_storage::{PromptStorage, StorageError};
use tracing::debug;

use crate::error::{PromptError, PromptResult};

/// Authoritative set of current prompts, one per identifier.
///
/// Reads are served from memory and fall back to storage on a miss; writes
/// go to storage first so a failed save never leaves memory ahead of disk.
/// A storage fill never replaces an entry written while the load was in
/// flight.
pub struct PromptRegistry {
    prompts: RwLock<HashMap<PromptId, Prompt>>,
    storage: Arc<dyn PromptStorage>,
    // Bumped under the write lock by every put, install, delete, and hydrate.
    generation: AtomicU64,
}

impl fmt::Debug for PromptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptRegistry")
            .field("cached", &self.len())
            .finish_non_exhaustive()
    }
}

impl PromptRegistry {
    /// Creates an empty registry over `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn PromptStorage>) -> Self {
        Self {
            prompts: RwLock::new(HashMap::new()),
            storage,
            generation: AtomicU64::new(0),
        }
    }

    /// Returns the storage backend.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn PromptStorage> {
        &self.storage
    }

    /// Returns the current prompt for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::PromptNotFound`] when neither memory nor storage
    /// holds the prompt.
    pub async fn get(&self, id: &PromptId) -> PromptResult<Prompt> {
        self.find(id).await?.ok_or_else(|| PromptError::not_found(id))
    }

    /// Returns the current prompt for `id`, or `None`.
    ///
    /// # Errors
    ///
    /// Propagates storage failures other than "not found".
    pub async fn find(&self, id: &PromptId) -> PromptResult<Option<Prompt>> {
        loop {
            if let Some(prompt) = self.read().get(id).cloned() {
                return Ok(Some(prompt));
            }
            let observed = self.generation.load(Ordering::Acquire);
            let loaded = match self.storage.load(id, None).await {
                Ok(prompt) => Some(prompt),
                Err(StorageError::NotFound { .. }) => None,
                Err(err) => return Err(err.into()),
            };

            // If a write landed during the load, retry from memory instead.
            let settled = {
                let mut prompts = self.write();
                (self.generation.load(Ordering::Acquire) == observed).then(|| {
                    loaded.map(|prompt| prompts.entry(id.clone()).or_insert(prompt).clone())
                })
            };
            if let Some(found) = settled {
                if let Some(prompt) = &found {
                    debug!(prompt_id = %id, version = %prompt.version(), "prompt loaded from storage");
                }
                return Ok(found);
            }
        }
    }

    /// Returns `id` at `version`, consulting storage for non-current versions.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::VersionNotFound`] when storage has no such record.
    pub async fn get_version(&self, id: &PromptId, version: Version) -> PromptResult<Prompt> {
        if let Some(prompt) = self
            .read()
            .get(id)
            .filter(|prompt| prompt.version() == version)
            .cloned()
        {
            return Ok(prompt);
        }
        self.storage
            .load(id, Some(version))
            .await
            .map_err(|err| match err {
                StorageError::NotFound { .. } => PromptError::VersionNotFound {
                    id: id.clone(),
                    version: Some(version),
                },
                other => other.into(),
            })
    }

    /// Saves `prompt` and makes it the current entry for its id.
    ///
    /// # Errors
    ///
    /// Propagates storage failures; memory is untouched in that case.
    pub async fn put(&self, prompt: Prompt) -> PromptResult<()> {
        self.persist(&prompt).await?;
        self.install(prompt);
        Ok(())
    }

    /// Writes `prompt` to storage without making it current in memory.
    ///
    /// Pair with [`PromptRegistry::install`] once the rest of the write has
    /// succeeded, or [`PromptRegistry::discard`] to undo it.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn persist(&self, prompt: &Prompt) -> PromptResult<()> {
        Ok(self.storage.save(prompt).await?)
    }

    /// Makes `prompt` the current in-memory entry for its id.
    pub fn install(&self, prompt: Prompt) {
        let mut prompts = self.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        prompts.insert(prompt.id().clone(), prompt);
    }

    /// Removes one persisted version that was never installed.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn discard(&self, id: &PromptId, version: Version) -> PromptResult<()> {
        self.storage.delete(id, Some(version)).await?;
        Ok(())
    }

    /// Removes every stored version of `id`. Returns `true` if anything was removed.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn delete(&self, id: &PromptId) -> PromptResult<bool> {
        let stored = self.storage.delete(id, None).await?;
        let cached = {
            let mut prompts = self.write();
            self.generation.fetch_add(1, Ordering::AcqRel);
            prompts.remove(id).is_some()
        };
        Ok(stored || cached)
    }

    /// Returns `true` if a current prompt exists for `id`.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn exists(&self, id: &PromptId) -> PromptResult<bool> {
        if self.read().contains_key(id) {
            return Ok(true);
        }
        Ok(self.storage.exists(id, None).await?)
    }

    /// Returns current prompts matching `filter`, sorted by id.
    #[must_use]
    pub fn list(&self, filter: &PromptFilter) -> Vec<Prompt> {
        let mut prompts: Vec<_> = self
            .read()
            .values()
            .filter(|prompt| filter.matches(prompt))
            .cloned()
            .collect();
        prompts.sort_by(|a, b| a.id().cmp(b.id()));
        prompts
    }

    /// Loads the latest stored version of every prompt into memory.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn hydrate(&self) -> PromptResult<usize> {
        let stored = self.storage.list(&PromptFilter::default()).await?;
        let count = stored.len();
        let mut prompts = self.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        for prompt in stored {
            prompts.insert(prompt.id().clone(), prompt);
        }
        debug!(count, "registry hydrated from storage");
        Ok(count)
    }

    /// Number of prompts held in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if memory holds no prompts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<PromptId, Prompt>> {
        self.prompts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<PromptId, Prompt>> {
        self.prompts.write().unwrap_or_else(PoisonError::into_inner)
    }
}
