//! In-memory history index shared by the store implementations.

use std::collections::HashMap;

use prompt_primitives::{PromptId, PromptVersion, Version};

use crate::error::{VersionResult, VersionStoreError};

#[derive(Debug, Default)]
pub(crate) struct HistoryIndex {
    entries: HashMap<PromptId, Vec<PromptVersion>>,
}

impl HistoryIndex {
    pub(crate) fn check_new(&self, entry: &PromptVersion) -> VersionResult<()> {
        let taken = self.entries.get(entry.prompt_id()).is_some_and(|history| {
            history
                .iter()
                .any(|existing| existing.version() == entry.version())
        });
        if taken {
            return Err(VersionStoreError::Duplicate {
                id: entry.prompt_id().clone(),
                version: entry.version(),
            });
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, entry: PromptVersion) -> VersionResult<()> {
        self.check_new(&entry)?;
        self.entries
            .entry(entry.prompt_id().clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    pub(crate) fn history(&self, id: &PromptId) -> Vec<PromptVersion> {
        self.entries.get(id).cloned().unwrap_or_default()
    }

    pub(crate) fn latest(&self, id: &PromptId) -> VersionResult<PromptVersion> {
        self.entries
            .get(id)
            .and_then(|history| history.last())
            .cloned()
            .ok_or_else(|| VersionStoreError::NotFound {
                id: id.clone(),
                version: None,
            })
    }

    pub(crate) fn get(&self, id: &PromptId, version: Version) -> VersionResult<PromptVersion> {
        self.entries
            .get(id)
            .and_then(|history| history.iter().find(|entry| entry.version() == version))
            .cloned()
            .ok_or_else(|| VersionStoreError::NotFound {
                id: id.clone(),
                version: Some(version),
            })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}
