//! Durable version store backed by a JSON-lines journal.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use prompt_primitives::{PromptId, PromptVersion, Version};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::VersionResult;
use crate::index::HistoryIndex;
use crate::store::VersionStore;

/// Version store appending one JSON snapshot per line to a journal file.
///
/// The journal is replayed into memory on open. Appends hold the file lock
/// across the duplicate check, the write, and the index update, so the
/// journal never records a duplicate `(id, version)`. Bytes left behind by
/// a failed write are cut off before the next entry goes in.
#[derive(Debug)]
pub struct JournalVersionStore {
    path: PathBuf,
    file: Mutex<JournalFile>,
    index: RwLock<HistoryIndex>,
}

/// Journal handle plus the length of its last complete entry.
#[derive(Debug)]
struct JournalFile {
    file: fs::File,
    end: u64,
}

impl JournalFile {
    async fn write_line(&mut self, line: &[u8]) -> VersionResult<()> {
        if self.file.metadata().await?.len() != self.end {
            warn!(end = self.end, "discarding torn bytes at end of journal");
            self.file.set_len(self.end).await?;
        }

        let written = match self.file.write_all(line).await {
            Ok(()) => self.file.flush().await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            if let Err(undo) = self.file.set_len(self.end).await {
                warn!(error = %undo, "failed to truncate torn journal write");
            }
            return Err(err.into());
        }
        self.end += line.len() as u64;
        Ok(())
    }
}

impl JournalVersionStore {
    /// Opens (or creates) a journal at `path` and replays its entries.
    ///
    /// Lines that cannot be decoded (for example a torn final write) are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors encountered while reading or creating the file.
    pub async fn open(path: impl Into<PathBuf>) -> VersionResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut index = HistoryIndex::default();
        let mut torn_tail = false;
        match fs::read(&path).await {
            Ok(data) => {
                replay(&path, &data, &mut index);
                torn_tail = data.last().is_some_and(|byte| *byte != b'\n');
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        // Terminate a torn final line so the next entry starts cleanly.
        if torn_tail {
            file.write_all(b"\n").await?;
            file.flush().await?;
        }
        let end = file.metadata().await?.len();

        info!(path = %path.display(), entries = index.len(), "opened version journal");
        Ok(Self {
            path,
            file: Mutex::new(JournalFile { file, end }),
            index: RwLock::new(index),
        })
    }

    /// Returns the journal path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn replay(path: &Path, data: &[u8], index: &mut HistoryIndex) {
    for (line_no, chunk) in data.split(|byte| *byte == b'\n').enumerate() {
        if chunk.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let entry = match serde_json::from_slice::<PromptVersion>(chunk) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(path = %path.display(), line = line_no + 1, error = %err, "skipping undecodable journal line");
                continue;
            }
        };
        if let Err(err) = index.insert(entry) {
            warn!(path = %path.display(), line = line_no + 1, error = %err, "skipping duplicate journal entry");
        }
    }
}

#[async_trait]
impl VersionStore for JournalVersionStore {
    async fn append(&self, entry: PromptVersion) -> VersionResult<PromptVersion> {
        let mut journal = self.file.lock().await;
        self.index.read().await.check_new(&entry)?;

        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        journal.write_line(&line).await?;

        self.index.write().await.insert(entry.clone())?;
        debug!(prompt_id = %entry.prompt_id(), version = %entry.version(), "version journaled");
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

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use prompt_primitives::Prompt;

    use super::*;
    use crate::VersionStoreError;

    fn prompt(version: &str) -> Prompt {
        Prompt::builder("summary")
            .version(version)
            .text("Summarise {{text}}")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn replays_history_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history").join("versions.jsonl");
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        {
            let store = JournalVersionStore::open(&path).await.unwrap();
            store.commit(prompt("1.0.0"), Some("initial".into())).await.unwrap();
            store
                .append(
                    PromptVersion::new(prompt("1.0.1"), Some("typo".into()))
                        .with_parent_version(Version::new(1, 0, 0))
                        .with_created_by("ci")
                        .with_created_at(created),
                )
                .await
                .unwrap();
        }

        let store = JournalVersionStore::open(&path).await.unwrap();
        let id = prompt("1.0.0").id().clone();
        let history = store.history(&id).await.unwrap();
        assert_eq!(history.len(), 2);
        let latest = store.latest(&id).await.unwrap();
        assert_eq!(latest.version(), Version::new(1, 0, 1));
        assert_eq!(latest.parent_version(), Some(Version::new(1, 0, 0)));
        assert_eq!(latest.created_by(), Some("ci"));
        assert_eq!(latest.created_at(), created);
        assert!(matches!(
            store.commit(prompt("1.0.0"), None).await,
            Err(VersionStoreError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn skips_torn_lines_on_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versions.jsonl");
        {
            let store = JournalVersionStore::open(&path).await.unwrap();
            store.commit(prompt("1.0.0"), None).await.unwrap();
        }
        let mut data = std::fs::read(&path).unwrap();
        data.extend_from_slice(b"{\"prompt_id\": \"summ");
        std::fs::write(&path, data).unwrap();

        let store = JournalVersionStore::open(&path).await.unwrap();
        let id = prompt("1.0.0").id().clone();
        assert_eq!(store.history(&id).await.unwrap().len(), 1);
        store.commit(prompt("1.1.0"), None).await.unwrap();
        drop(store);

        let store = JournalVersionStore::open(&path).await.unwrap();
        assert_eq!(store.history(&id).await.unwrap().len(), 2);
        assert!(matches!(
            store.get(&id, Version::new(2, 0, 0)).await,
            Err(VersionStoreError::NotFound { version: Some(_), .. })
        ));
    }

    #[tokio::test]
    async fn torn_write_while_open_is_cut_before_next_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versions.jsonl");
        let store = JournalVersionStore::open(&path).await.unwrap();
        store.commit(prompt("1.0.0"), None).await.unwrap();

        {
            use std::io::Write;
            let mut raw = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            raw.write_all(b"{\"prompt_id\": \"summ").unwrap();
        }
        store.commit(prompt("1.1.0"), None).await.unwrap();
        drop(store);

        let data = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = data.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(
            lines
                .iter()
                .all(|line| serde_json::from_str::<PromptVersion>(line).is_ok())
        );

        let store = JournalVersionStore::open(&path).await.unwrap();
        let id = prompt("1.0.0").id().clone();
        assert_eq!(store.latest(&id).await.unwrap().version(), Version::new(1, 1, 0));
        assert_eq!(store.history(&id).await.unwrap().len(), 2);
    }
}
