//! In-memory storage with optional JSON-lines persistence.
//!
//! All state lives behind a single reader/writer lock. When a persistence
//! path is configured, every successful mutation is appended to the file as
//! one JSON object per line, and `close()` compacts the file so it holds
//! exactly one line per mapping.

use crate::models::{BatchEntry, SavedEntry, UrlMapping};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// One line of the persistence file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileRecord {
    uuid: u64,
    short_url: String,
    original_url: String,
    user_id: String,
    #[serde(default)]
    is_deleted: bool,
}

impl FileRecord {
    fn into_mapping(self) -> UrlMapping {
        UrlMapping {
            short_key: self.short_url,
            original_url: self.original_url,
            user_id: self.user_id,
            deleted: self.is_deleted,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredRecord {
    id: u64,
    mapping: UrlMapping,
}

impl StoredRecord {
    fn to_file_record(&self) -> FileRecord {
        FileRecord {
            uuid: self.id,
            short_url: self.mapping.short_key.clone(),
            original_url: self.mapping.original_url.clone(),
            user_id: self.mapping.user_id.clone(),
            is_deleted: self.mapping.deleted,
        }
    }
}

#[derive(Default)]
struct MemoryState {
    by_key: HashMap<String, StoredRecord>,
    by_owner: HashMap<(String, String), String>,
    next_id: u64,
    journal: Option<File>,
    closed: bool,
}

impl MemoryState {
    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    fn insert(&mut self, mapping: UrlMapping) -> StoredRecord {
        self.next_id += 1;
        let record = StoredRecord {
            id: self.next_id,
            mapping,
        };
        self.by_owner.insert(
            (
                record.mapping.user_id.clone(),
                record.mapping.original_url.clone(),
            ),
            record.mapping.short_key.clone(),
        );
        self.by_key
            .insert(record.mapping.short_key.clone(), record.clone());
        record
    }

    /// Apply one replayed line. Returns `false` when the line was rejected.
    fn replay(&mut self, record: FileRecord) -> bool {
        self.next_id = self.next_id.max(record.uuid);

        if let Some(existing) = self.by_key.get_mut(&record.short_url) {
            let same_mapping = existing.mapping.user_id == record.user_id
                && existing.mapping.original_url == record.original_url;
            if same_mapping && record.is_deleted {
                existing.mapping.deleted = true;
                return true;
            }
            return false;
        }

        let owner = (record.user_id.clone(), record.original_url.clone());
        if self.by_owner.contains_key(&owner) {
            return false;
        }

        let id = record.uuid;
        let mapping = record.into_mapping();
        self.by_owner.insert(owner, mapping.short_key.clone());
        self.by_key
            .insert(mapping.short_key.clone(), StoredRecord { id, mapping });
        true
    }

    async fn append(&mut self, records: &[FileRecord]) -> StorageResult<()> {
        let Some(journal) = self.journal.as_mut() else {
            return Ok(());
        };
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record).map_err(StorageError::other)?;
            buf.push(b'\n');
        }

        journal
            .write_all(&buf)
            .await
            .context("failed to append to persistence file")?;
        journal
            .flush()
            .await
            .context("failed to flush persistence file")?;
        Ok(())
    }
}

pub struct MemoryStorage {
    state: RwLock<MemoryState>,
    path: Option<PathBuf>,
}

impl MemoryStorage {
    /// Purely in-memory storage; nothing survives the process.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            path: None,
        }
    }

    /// Open storage backed by the JSON-lines file at `path`, replaying any
    /// existing content. Duplicate records are rejected with a warning.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = MemoryState::default();

        match fs::read_to_string(&path).await {
            Ok(contents) => {
                let mut rejected = 0usize;
                for (idx, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record: FileRecord = serde_json::from_str(line).with_context(|| {
                        format!("malformed record on line {} of {}", idx + 1, path.display())
                    })?;
                    let short_url = record.short_url.clone();
                    if !state.replay(record) {
                        warn!(short_url = %short_url, line = idx + 1, "rejecting duplicate record");
                        rejected += 1;
                    }
                }
                info!(
                    path = %path.display(),
                    mappings = state.by_key.len(),
                    rejected,
                    "Loaded persisted mappings"
                );
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No persistence file yet, starting empty");
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read persistence file {}", path.display()))
            }
        }

        let journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to open persistence file {}", path.display()))?;
        state.journal = Some(journal);

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    /// Rewrite the persistence file with one line per mapping.
    async fn compact(&self, state: &MemoryState) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        let mut records: Vec<&StoredRecord> = state.by_key.values().collect();
        records.sort_by_key(|r| r.id);

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, &record.to_file_record())?;
            buf.push(b'\n');
        }

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &buf)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .await
            .with_context(|| format!("failed to replace {}", path.display()))?;

        info!(path = %path.display(), mappings = state.by_key.len(), "Compacted persistence file");
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn save(&self, mapping: &UrlMapping) -> StorageResult<()> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        let owner = (mapping.user_id.clone(), mapping.original_url.clone());
        if let Some(existing) = state.by_owner.get(&owner) {
            return Err(StorageError::Conflict {
                short_key: existing.clone(),
            });
        }
        if state.by_key.contains_key(&mapping.short_key) {
            return Err(StorageError::Collision(mapping.short_key.clone()));
        }

        let line = FileRecord {
            uuid: state.next_id + 1,
            short_url: mapping.short_key.clone(),
            original_url: mapping.original_url.clone(),
            user_id: mapping.user_id.clone(),
            is_deleted: mapping.deleted,
        };
        state.append(&[line]).await?;
        state.insert(mapping.clone());
        Ok(())
    }

    async fn get_by_short_key(&self, short_key: &str) -> StorageResult<Option<UrlMapping>> {
        let state = self.state.read().await;
        state.ensure_open()?;
        Ok(state.by_key.get(short_key).map(|r| r.mapping.clone()))
    }

    async fn find_short_key(
        &self,
        user_id: &str,
        original_url: &str,
    ) -> StorageResult<Option<String>> {
        let state = self.state.read().await;
        state.ensure_open()?;
        Ok(state
            .by_owner
            .get(&(user_id.to_string(), original_url.to_string()))
            .cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> StorageResult<Vec<UrlMapping>> {
        let state = self.state.read().await;
        state.ensure_open()?;
        let mut owned: Vec<&StoredRecord> = state
            .by_key
            .values()
            .filter(|r| r.mapping.user_id == user_id && !r.mapping.deleted)
            .collect();
        owned.sort_by_key(|r| r.id);
        Ok(owned.into_iter().map(|r| r.mapping.clone()).collect())
    }

    async fn batch_save(
        &self,
        user_id: &str,
        entries: &[BatchEntry],
    ) -> StorageResult<Vec<SavedEntry>> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        // Resolve every entry before touching the maps so a collision leaves
        // the state untouched.
        let mut results = Vec::with_capacity(entries.len());
        let mut fresh: Vec<UrlMapping> = Vec::new();
        let mut fresh_keys: HashSet<&str> = HashSet::new();
        let mut fresh_urls: HashMap<&str, &str> = HashMap::new();

        for entry in entries {
            let owner = (user_id.to_string(), entry.original_url.clone());
            if let Some(existing) = state.by_owner.get(&owner) {
                results.push(SavedEntry {
                    short_key: existing.clone(),
                    conflict: true,
                });
                continue;
            }
            if let Some(key) = fresh_urls.get(entry.original_url.as_str()) {
                results.push(SavedEntry {
                    short_key: (*key).to_string(),
                    conflict: true,
                });
                continue;
            }
            if state.by_key.contains_key(&entry.short_key)
                || fresh_keys.contains(entry.short_key.as_str())
            {
                return Err(StorageError::Collision(entry.short_key.clone()));
            }

            fresh_keys.insert(&entry.short_key);
            fresh_urls.insert(&entry.original_url, &entry.short_key);
            fresh.push(UrlMapping::new(
                entry.short_key.clone(),
                entry.original_url.clone(),
                user_id,
            ));
            results.push(SavedEntry {
                short_key: entry.short_key.clone(),
                conflict: false,
            });
        }

        let lines: Vec<FileRecord> = fresh
            .iter()
            .enumerate()
            .map(|(offset, mapping)| FileRecord {
                uuid: state.next_id + 1 + offset as u64,
                short_url: mapping.short_key.clone(),
                original_url: mapping.original_url.clone(),
                user_id: mapping.user_id.clone(),
                is_deleted: false,
            })
            .collect();
        state.append(&lines).await?;

        for mapping in fresh {
            state.insert(mapping);
        }

        Ok(results)
    }

    async fn batch_mark_deleted(
        &self,
        user_id: &str,
        short_keys: &[String],
    ) -> StorageResult<u64> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        let mut tombstoned = Vec::new();
        let mut seen = HashSet::new();
        for key in short_keys {
            let Some(record) = state.by_key.get(key) else {
                continue;
            };
            if record.mapping.user_id == user_id && !record.mapping.deleted && seen.insert(key) {
                let mut line = record.to_file_record();
                line.is_deleted = true;
                tombstoned.push(line);
            }
        }

        // Journal first: memory must never hold a tombstone the file lacks
        state.append(&tombstoned).await?;
        for line in &tombstoned {
            if let Some(record) = state.by_key.get_mut(&line.short_url) {
                record.mapping.deleted = true;
            }
        }
        Ok(tombstoned.len() as u64)
    }

    async fn count_urls(&self) -> StorageResult<u64> {
        let state = self.state.read().await;
        state.ensure_open()?;
        Ok(state.by_key.len() as u64)
    }

    async fn count_users(&self) -> StorageResult<u64> {
        let state = self.state.read().await;
        state.ensure_open()?;
        let users: HashSet<&str> = state
            .by_key
            .values()
            .map(|r| r.mapping.user_id.as_str())
            .collect();
        Ok(users.len() as u64)
    }

    async fn ping(&self) -> StorageResult<()> {
        self.state.read().await.ensure_open()
    }

    async fn close(&self) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.closed {
            return Ok(());
        }
        // On failure the journal stays open and mutations keep being recorded
        self.compact(&state).await?;
        state.journal = None;
        state.closed = true;
        Ok(())
    }
}
