//! JSON file storage backend.
//!
//! Layout: `{root}/{prompt_id}/{major.minor.patch}.json`, one pretty-printed
//! prompt document per file. Writes go to a temporary sibling first and are
//! renamed into place so readers never observe a partial file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use prompt_primitives::{Prompt, PromptFilter, PromptId, Version};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::backend::PromptStorage;
use crate::error::{StorageError, StorageResult};

const EXTENSION: &str = "json";

/// File-backed storage writing one JSON document per revision.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
    write_gate: Mutex<()>,
}

impl FileStorage {
    /// Opens (or creates) a storage directory.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors raised while creating the directory.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "opened file storage");
        Ok(Self {
            root,
            write_gate: Mutex::new(()),
        })
    }

    /// Returns the storage root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn prompt_dir(&self, id: &PromptId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn revision_path(&self, id: &PromptId, version: Version) -> PathBuf {
        self.prompt_dir(id).join(format!("{version}.{EXTENSION}"))
    }

    async fn read_revision(&self, path: &Path) -> StorageResult<Prompt> {
        let bytes = fs::read(path).await?;
        serde_json::from_slice(&bytes).map_err(|err| StorageError::Corrupt {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    async fn stored_versions(&self, id: &PromptId) -> StorageResult<Vec<Version>> {
        let dir = self.prompt_dir(id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match Version::parse(stem) {
                Ok(version) => versions.push(version),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping file with non-version name");
                }
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    async fn prompt_ids(&self) -> StorageResult<Vec<PromptId>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            match name.to_str().map(PromptId::new) {
                Some(Ok(id)) => ids.push(id),
                _ => warn!(entry = ?name, "skipping directory with invalid prompt id"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl PromptStorage for FileStorage {
    async fn save(&self, prompt: &Prompt) -> StorageResult<()> {
        let path = self.revision_path(prompt.id(), prompt.version());
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(prompt)?;

        let _gate = self.write_gate.lock().await;
        fs::create_dir_all(self.prompt_dir(prompt.id())).await?;
        fs::write(&tmp, &body).await?;
        fs::rename(&tmp, &path).await?;
        debug!(prompt_id = %prompt.id(), version = %prompt.version(), path = %path.display(), "saved prompt");
        Ok(())
    }

    async fn load(&self, id: &PromptId, version: Option<Version>) -> StorageResult<Prompt> {
        let target = match version {
            Some(version) => version,
            None => *self
                .stored_versions(id)
                .await?
                .last()
                .ok_or_else(|| StorageError::not_found(id, None))?,
        };
        let path = self.revision_path(id, target);
        match self.read_revision(&path).await {
            Err(StorageError::Io { source }) if source.kind() == ErrorKind::NotFound => {
                Err(StorageError::not_found(id, version))
            }
            other => other,
        }
    }

    async fn delete(&self, id: &PromptId, version: Option<Version>) -> StorageResult<bool> {
        let _gate = self.write_gate.lock().await;
        let result = match version {
            Some(version) => fs::remove_file(self.revision_path(id, version)).await,
            None => fs::remove_dir_all(self.prompt_dir(id)).await,
        };
        match result {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        }

        // Drop the directory once its last revision is gone.
        if version.is_some() && self.stored_versions(id).await?.is_empty() {
            match fs::remove_dir_all(self.prompt_dir(id)).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(true)
    }

    async fn list(&self, filter: &PromptFilter) -> StorageResult<Vec<Prompt>> {
        let mut prompts = Vec::new();
        for id in self.prompt_ids().await? {
            let Some(latest) = self.stored_versions(&id).await?.last().copied() else {
                continue;
            };
            match self.read_revision(&self.revision_path(&id, latest)).await {
                Ok(prompt) if filter.matches(&prompt) => prompts.push(prompt),
                Ok(_) => {}
                Err(StorageError::Corrupt { path, reason }) => {
                    warn!(path = %path.display(), %reason, "skipping corrupt prompt record");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(prompts)
    }

    async fn exists(&self, id: &PromptId, version: Option<Version>) -> StorageResult<bool> {
        match version {
            Some(version) => Ok(fs::try_exists(self.revision_path(id, version)).await?),
            None => Ok(!self.stored_versions(id).await?.is_empty()),
        }
    }

    async fn versions(&self, id: &PromptId) -> StorageResult<Vec<Version>> {
        self.stored_versions(id).await
    }
}
