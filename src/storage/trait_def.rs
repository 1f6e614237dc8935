use crate::models::{BatchEntry, SavedEntry, UrlMapping};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The user already shortened this URL; carries the existing key.
    #[error("url already shortened as {short_key}")]
    Conflict { short_key: String },
    /// The proposed short key is bound to another mapping.
    #[error("short key {0} already exists")]
    Collision(String),
    #[error("storage is closed")]
    Closed,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    pub(crate) fn other(err: impl Into<anyhow::Error>) -> Self {
        StorageError::Other(err.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Insert a new mapping.
    ///
    /// Fails with [`StorageError::Conflict`] if the user already shortened
    /// `original_url`, and with [`StorageError::Collision`] if the short key
    /// is taken.
    async fn save(&self, mapping: &UrlMapping) -> StorageResult<()>;

    /// Look up a mapping by short key, tombstoned ones included.
    async fn get_by_short_key(&self, short_key: &str) -> StorageResult<Option<UrlMapping>>;

    async fn find_short_key(
        &self,
        user_id: &str,
        original_url: &str,
    ) -> StorageResult<Option<String>>;

    /// Live (non-deleted) mappings owned by `user_id`.
    async fn list_by_user(&self, user_id: &str) -> StorageResult<Vec<UrlMapping>>;

    /// Save every entry for `user_id` atomically.
    ///
    /// Entries whose URL the user already shortened come back with the
    /// existing key and `conflict = true`. A key collision on any entry rolls
    /// the whole batch back.
    async fn batch_save(
        &self,
        user_id: &str,
        entries: &[BatchEntry],
    ) -> StorageResult<Vec<SavedEntry>>;

    /// Tombstone the given keys owned by `user_id`, returning how many rows
    /// changed. Keys owned by other users are ignored.
    async fn batch_mark_deleted(&self, user_id: &str, short_keys: &[String])
        -> StorageResult<u64>;

    /// Total number of mappings, tombstoned ones included.
    async fn count_urls(&self) -> StorageResult<u64>;

    async fn count_users(&self) -> StorageResult<u64>;

    async fn ping(&self) -> StorageResult<()>;

    async fn close(&self) -> StorageResult<()>;
}
