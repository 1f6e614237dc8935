use crate::models::{BatchEntry, SavedEntry, UrlMapping};
use crate::storage::{Storage, StorageError, StorageResult, PING_TIMEOUT};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

/// Map an insert failure, turning a unique violation on `short_url` into a
/// collision.
fn insert_error(err: sqlx::Error, short_key: &str) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::Collision(short_key.to_string())
        }
        sqlx::Error::PoolClosed => StorageError::Closed,
        _ => StorageError::other(err),
    }
}

fn query_error(err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::PoolClosed => StorageError::Closed,
        other => StorageError::other(other),
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_url TEXT NOT NULL UNIQUE,
                original_url TEXT NOT NULL,
                user_id TEXT NOT NULL,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_urls_user_original ON urls(user_id, original_url)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn save(&self, mapping: &UrlMapping) -> StorageResult<()> {
        // The no-op update makes RETURNING yield the existing key on conflict
        let short_key = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO urls (short_url, original_url, user_id, is_deleted)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id, original_url) DO UPDATE SET user_id = excluded.user_id
            RETURNING short_url
            "#,
        )
        .bind(&mapping.short_key)
        .bind(&mapping.original_url)
        .bind(&mapping.user_id)
        .bind(mapping.deleted)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| insert_error(e, &mapping.short_key))?;

        if short_key != mapping.short_key {
            return Err(StorageError::Conflict { short_key });
        }
        Ok(())
    }

    async fn get_by_short_key(&self, short_key: &str) -> StorageResult<Option<UrlMapping>> {
        sqlx::query_as::<_, UrlMapping>(
            r#"
            SELECT short_url, original_url, user_id, is_deleted
            FROM urls
            WHERE short_url = ?
            "#,
        )
        .bind(short_key)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(query_error)
    }

    async fn find_short_key(
        &self,
        user_id: &str,
        original_url: &str,
    ) -> StorageResult<Option<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT short_url FROM urls WHERE user_id = ? AND original_url = ?",
        )
        .bind(user_id)
        .bind(original_url)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(query_error)
    }

    async fn list_by_user(&self, user_id: &str) -> StorageResult<Vec<UrlMapping>> {
        sqlx::query_as::<_, UrlMapping>(
            r#"
            SELECT short_url, original_url, user_id, is_deleted
            FROM urls
            WHERE user_id = ? AND is_deleted = FALSE
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(query_error)
    }

    async fn batch_save(
        &self,
        user_id: &str,
        entries: &[BatchEntry],
    ) -> StorageResult<Vec<SavedEntry>> {
        let mut tx = self.pool.begin().await.map_err(query_error)?;
        let mut results = Vec::with_capacity(entries.len());

        for entry in entries {
            let short_key = sqlx::query_scalar::<_, String>(
                r#"
                INSERT INTO urls (short_url, original_url, user_id)
                VALUES (?, ?, ?)
                ON CONFLICT (user_id, original_url) DO UPDATE SET user_id = excluded.user_id
                RETURNING short_url
                "#,
            )
            .bind(&entry.short_key)
            .bind(&entry.original_url)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| insert_error(e, &entry.short_key))?;

            // Dropping `tx` on the error path above rolls the batch back
            let conflict = short_key != entry.short_key;
            results.push(SavedEntry {
                short_key,
                conflict,
            });
        }

        tx.commit().await.map_err(query_error)?;
        Ok(results)
    }

    async fn batch_mark_deleted(
        &self,
        user_id: &str,
        short_keys: &[String],
    ) -> StorageResult<u64> {
        if short_keys.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "UPDATE urls SET is_deleted = TRUE WHERE is_deleted = FALSE AND user_id = ",
        );
        builder.push_bind(user_id.to_string());
        builder.push(" AND short_url IN (");
        let mut keys = builder.separated(", ");
        for key in short_keys {
            keys.push_bind(key.clone());
        }
        keys.push_unseparated(")");

        let result = builder
            .build()
            .execute(self.pool.as_ref())
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected())
    }

    async fn count_urls(&self) -> StorageResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM urls")
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(query_error)?;
        Ok(count as u64)
    }

    async fn count_users(&self) -> StorageResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(DISTINCT user_id) FROM urls")
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(query_error)?;
        Ok(count as u64)
    }

    async fn ping(&self) -> StorageResult<()> {
        let probe = sqlx::query("SELECT 1").execute(self.pool.as_ref());
        match tokio::time::timeout(PING_TIMEOUT, probe).await {
            Ok(result) => result.map(|_| ()).map_err(query_error),
            Err(_) => Err(StorageError::Other(anyhow!(
                "ping timed out after {}s",
                PING_TIMEOUT.as_secs()
            ))),
        }
    }

    async fn close(&self) -> StorageResult<()> {
        self.pool.close().await;
        Ok(())
    }
}
