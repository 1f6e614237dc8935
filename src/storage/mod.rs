pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{Storage, StorageError, StorageResult};

use crate::config::{StorageBackend, StorageConfig};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Deadline for the relational liveness probe.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the configured backend and run its initialisation.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend {
        StorageBackend::Memory => match &config.file_path {
            Some(path) => {
                info!("Using in-memory storage persisted to {}", path);
                Arc::new(MemoryStorage::open(path).await?)
            }
            None => {
                info!("Using in-memory storage without persistence");
                Arc::new(MemoryStorage::new())
            }
        },
        StorageBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database_url);
            Arc::new(SqliteStorage::new(&config.database_url, config.max_connections).await?)
        }
        StorageBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database_url);
            Arc::new(PostgresStorage::new(&config.database_url, config.max_connections).await?)
        }
    };

    storage
        .init()
        .await
        .context("failed to initialize storage")?;
    Ok(storage)
}
