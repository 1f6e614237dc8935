use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored short key → original URL binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UrlMapping {
    #[sqlx(rename = "short_url")]
    pub short_key: String,
    pub original_url: String,
    pub user_id: String,
    #[sqlx(rename = "is_deleted")]
    pub deleted: bool,
}

impl UrlMapping {
    pub fn new(
        short_key: impl Into<String>,
        original_url: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            short_key: short_key.into(),
            original_url: original_url.into(),
            user_id: user_id.into(),
            deleted: false,
        }
    }
}

/// A proposed row for `Storage::batch_save`.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub short_key: String,
    pub original_url: String,
}

/// Outcome of saving one `BatchEntry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedEntry {
    pub short_key: String,
    /// `true` when the URL was already shortened by this user and
    /// `short_key` is the pre-existing key.
    pub conflict: bool,
}

/// One item of a batch shortening request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

/// One item of a batch shortening response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub correlation_id: String,
    pub short_url: String,
}

/// A user's short URL as listed back to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUrl {
    pub short_url: String,
    pub original_url: String,
}

/// Request body of `POST /api/shorten`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShortenRequest {
    pub url: String,
}

/// Response body of `POST /api/shorten`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub result: String,
}

/// Service-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub urls: u64,
    pub users: u64,
}
