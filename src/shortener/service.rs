use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::error::ServiceError;
use super::keygen::KeyGenerator;
use crate::deleter::{DeletePipeline, DeleteTask};
use crate::models::{BatchEntry, BatchItem, BatchResult, StatsSnapshot, UrlMapping, UserUrl};
use crate::storage::{Storage, StorageError};

/// First attempt plus three retries on a short key collision.
const MAX_KEY_ATTEMPTS: usize = 4;

/// Result of shortening one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortened {
    pub short_key: String,
    pub short_url: String,
    /// `false` when the user had already shortened this URL.
    pub is_new: bool,
}

pub struct ShortenerService {
    storage: Arc<dyn Storage>,
    keygen: Arc<dyn KeyGenerator>,
    deleter: Arc<DeletePipeline>,
    base_url: String,
}

/// Accept absolute URLs with a scheme and a host, returning the normalized
/// form so the stored value is always a valid `Location` header.
fn validate_url(raw: &str) -> Result<String, ServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidArgument("url must not be empty".into()));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|e| ServiceError::InvalidArgument(format!("invalid url '{trimmed}': {e}")))?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed.to_string()),
        _ => Err(ServiceError::InvalidArgument(format!(
            "invalid url '{trimmed}': missing host"
        ))),
    }
}

impl ShortenerService {
    pub fn new(
        storage: Arc<dyn Storage>,
        keygen: Arc<dyn KeyGenerator>,
        deleter: Arc<DeletePipeline>,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            storage,
            keygen,
            deleter,
            base_url,
        }
    }

    pub fn short_url(&self, short_key: &str) -> String {
        format!("{}/{}", self.base_url, short_key)
    }

    /// Shorten `url` for `user_id`, returning the existing key with
    /// `is_new = false` when the user already shortened it.
    pub async fn shorten(&self, user_id: &str, url: &str) -> Result<Shortened, ServiceError> {
        let original_url = validate_url(url)?;

        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let mapping = UrlMapping::new(self.keygen.generate(), original_url.clone(), user_id);
            match self.storage.save(&mapping).await {
                Ok(()) => {
                    debug!(user_id = %user_id, short_key = %mapping.short_key, "Shortened url");
                    return Ok(Shortened {
                        short_url: self.short_url(&mapping.short_key),
                        short_key: mapping.short_key,
                        is_new: true,
                    });
                }
                Err(StorageError::Conflict { short_key }) => {
                    return Ok(Shortened {
                        short_url: self.short_url(&short_key),
                        short_key,
                        is_new: false,
                    });
                }
                Err(StorageError::Collision(key)) => {
                    warn!(short_key = %key, attempt, "Short key collision, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ServiceError::Internal(anyhow!(
            "could not allocate a unique short key after {MAX_KEY_ATTEMPTS} attempts"
        )))
    }

    /// Shorten every item atomically, preserving input order.
    ///
    /// Items repeating a URL within the batch share one key. Any invalid URL
    /// rejects the whole batch.
    pub async fn batch_shorten(
        &self,
        user_id: &str,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchResult>, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::InvalidArgument("batch must not be empty".into()));
        }

        let mut unique: Vec<String> = Vec::new();
        let mut slot_of: HashMap<String, usize> = HashMap::new();
        let mut slots = Vec::with_capacity(items.len());
        for item in &items {
            let url = validate_url(&item.original_url)?;
            let slot = *slot_of.entry(url.clone()).or_insert_with(|| {
                unique.push(url);
                unique.len() - 1
            });
            slots.push(slot);
        }

        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let entries: Vec<BatchEntry> = unique
                .iter()
                .map(|url| BatchEntry {
                    short_key: self.keygen.generate(),
                    original_url: url.clone(),
                })
                .collect();

            match self.storage.batch_save(user_id, &entries).await {
                Ok(saved) => {
                    debug!(user_id = %user_id, items = items.len(), "Shortened batch");
                    return Ok(items
                        .into_iter()
                        .zip(slots)
                        .map(|(item, slot)| BatchResult {
                            correlation_id: item.correlation_id,
                            short_url: self.short_url(&saved[slot].short_key),
                        })
                        .collect());
                }
                Err(StorageError::Collision(key)) => {
                    warn!(short_key = %key, attempt, "Short key collision in batch, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ServiceError::Internal(anyhow!(
            "could not allocate unique short keys after {MAX_KEY_ATTEMPTS} attempts"
        )))
    }

    /// Original URL behind `short_key`.
    pub async fn resolve(&self, short_key: &str) -> Result<String, ServiceError> {
        if short_key.is_empty() {
            return Err(ServiceError::InvalidArgument("short key must not be empty".into()));
        }

        match self.storage.get_by_short_key(short_key).await? {
            None => Err(ServiceError::NotFound),
            Some(mapping) if mapping.deleted => Err(ServiceError::Gone),
            Some(mapping) => Ok(mapping.original_url),
        }
    }

    pub async fn list_user_urls(&self, user_id: &str) -> Result<Vec<UserUrl>, ServiceError> {
        let mappings = self.storage.list_by_user(user_id).await?;
        Ok(mappings
            .into_iter()
            .map(|m| UserUrl {
                short_url: self.short_url(&m.short_key),
                original_url: m.original_url,
            })
            .collect())
    }

    /// Hand the keys to the deletion pipeline and return without waiting.
    pub fn enqueue_delete(
        &self,
        user_id: &str,
        short_keys: Vec<String>,
    ) -> Result<(), ServiceError> {
        self.deleter.submit(DeleteTask::new(user_id, short_keys))?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<StatsSnapshot, ServiceError> {
        let urls = self.storage.count_urls().await?;
        let users = self.storage.count_users().await?;
        Ok(StatsSnapshot { urls, users })
    }

    pub async fn ping(&self) -> Result<(), ServiceError> {
        self.storage
            .ping()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))
    }
}
