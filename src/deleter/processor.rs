use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error};

use super::DeleteBatch;
use crate::storage::Storage;

/// One of the competing consumers of the flush queue.
pub(crate) struct Processor {
    pub(crate) id: usize,
    pub(crate) batches: Arc<Mutex<mpsc::Receiver<DeleteBatch>>>,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) permits: Arc<Semaphore>,
    pub(crate) sub_batch_size: usize,
}

impl Processor {
    pub(crate) async fn run(self) {
        loop {
            let next = self.batches.lock().await.recv().await;
            let Some(batch) = next else {
                break;
            };
            self.process(batch).await;
        }
        debug!(worker = self.id, "Delete processor stopped");
    }

    /// Apply every user of `batch` concurrently and wait for all of them
    /// before returning.
    async fn process(&self, batch: DeleteBatch) {
        debug!(
            worker = self.id,
            users = batch.user_count(),
            keys = batch.key_count(),
            "Processing delete batch"
        );

        let mut users = JoinSet::new();
        for (user_id, keys) in batch.into_users() {
            let storage = Arc::clone(&self.storage);
            let permits = Arc::clone(&self.permits);
            let sub_batch_size = self.sub_batch_size;

            users.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                apply_user_deletes(storage.as_ref(), &user_id, &keys, sub_batch_size).await;
            });
        }

        while let Some(joined) = users.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    error!(worker = self.id, error = %err, "Delete task panicked");
                }
            }
        }
    }
}

/// Tombstone `keys` for `user_id` in chunks of `sub_batch_size`.
///
/// A failing chunk is logged and skipped; it is not retried. Returns the
/// number of rows the storage reported as changed.
pub(crate) async fn apply_user_deletes(
    storage: &dyn Storage,
    user_id: &str,
    keys: &[String],
    sub_batch_size: usize,
) -> u64 {
    let mut tombstoned = 0;
    for chunk in keys.chunks(sub_batch_size.max(1)) {
        match storage.batch_mark_deleted(user_id, chunk).await {
            Ok(changed) => tombstoned += changed,
            Err(err) => {
                error!(
                    user_id = %user_id,
                    keys = chunk.len(),
                    error = %err,
                    "Failed to apply delete chunk"
                );
            }
        }
    }
    tombstoned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deleter::DeleteTask;
    use crate::models::{BatchEntry, SavedEntry, UrlMapping};
    use crate::storage::{MemoryStorage, StorageError, StorageResult};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// Records every tombstone call and fails the ones naming `poison`.
    struct FlakyStorage {
        inner: MemoryStorage,
        poison: String,
        calls: StdMutex<Vec<(String, Vec<String>)>>,
    }

    #[async_trait]
    impl Storage for FlakyStorage {
        async fn init(&self) -> anyhow::Result<()> {
            self.inner.init().await
        }
        async fn save(&self, mapping: &UrlMapping) -> StorageResult<()> {
            self.inner.save(mapping).await
        }
        async fn get_by_short_key(&self, short_key: &str) -> StorageResult<Option<UrlMapping>> {
            self.inner.get_by_short_key(short_key).await
        }
        async fn find_short_key(
            &self,
            user_id: &str,
            original_url: &str,
        ) -> StorageResult<Option<String>> {
            self.inner.find_short_key(user_id, original_url).await
        }
        async fn list_by_user(&self, user_id: &str) -> StorageResult<Vec<UrlMapping>> {
            self.inner.list_by_user(user_id).await
        }
        async fn batch_save(
            &self,
            user_id: &str,
            entries: &[BatchEntry],
        ) -> StorageResult<Vec<SavedEntry>> {
            self.inner.batch_save(user_id, entries).await
        }
        async fn batch_mark_deleted(
            &self,
            user_id: &str,
            short_keys: &[String],
        ) -> StorageResult<u64> {
            self.calls
                .lock()
                .unwrap()
                .push((user_id.to_string(), short_keys.to_vec()));
            if short_keys.contains(&self.poison) {
                return Err(StorageError::other(anyhow::anyhow!("injected failure")));
            }
            self.inner.batch_mark_deleted(user_id, short_keys).await
        }
        async fn count_urls(&self) -> StorageResult<u64> {
            self.inner.count_urls().await
        }
        async fn count_users(&self) -> StorageResult<u64> {
            self.inner.count_users().await
        }
        async fn ping(&self) -> StorageResult<()> {
            self.inner.ping().await
        }
        async fn close(&self) -> StorageResult<()> {
            self.inner.close().await
        }
    }

    async fn seeded(poison: &str) -> FlakyStorage {
        let inner = MemoryStorage::new();
        for (user, n) in [("alice", 5), ("bob", 2)] {
            for i in 0..n {
                inner
                    .save(&UrlMapping::new(
                        format!("{user}{i}"),
                        format!("https://example.com/{user}/{i}"),
                        user,
                    ))
                    .await
                    .unwrap();
            }
        }
        FlakyStorage {
            inner,
            poison: poison.to_string(),
            calls: StdMutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_keys_are_split_into_chunks() {
        let storage = seeded("none").await;
        let keys: Vec<String> = (0..5).map(|i| format!("alice{i}")).collect();

        let changed = apply_user_deletes(&storage, "alice", &keys, 2).await;

        assert_eq!(changed, 5);
        let calls = storage.calls.lock().unwrap();
        let sizes: Vec<usize> = calls.iter().map(|(_, keys)| keys.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_failed_chunk_does_not_stop_the_rest() {
        let storage = seeded("alice2").await;
        let keys: Vec<String> = (0..5).map(|i| format!("alice{i}")).collect();

        let changed = apply_user_deletes(&storage, "alice", &keys, 2).await;

        // Chunk [alice2, alice3] failed, the other two went through
        assert_eq!(changed, 3);
        let live: Vec<String> = storage
            .list_by_user("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.short_key)
            .collect();
        assert_eq!(live.len(), 2);
        assert!(live.contains(&"alice2".to_string()));
        assert!(live.contains(&"alice3".to_string()));
    }

    #[tokio::test]
    async fn test_processor_applies_every_user_and_exits_on_close() {
        let storage = Arc::new(seeded("alice0").await);
        let (tx, rx) = mpsc::channel(4);

        let processor = Processor {
            id: 0,
            batches: Arc::new(Mutex::new(rx)),
            storage: storage.clone(),
            permits: Arc::new(Semaphore::new(2)),
            sub_batch_size: 10,
        };
        let handle = tokio::spawn(processor.run());

        let mut batch = DeleteBatch::default();
        batch.push(DeleteTask::new(
            "alice",
            vec!["alice0".into(), "alice1".into()],
        ));
        batch.push(DeleteTask::new("bob", vec!["bob0".into()]));
        tx.send(batch).await.unwrap();
        drop(tx);

        handle.await.unwrap();

        // Alice's only chunk hit the poisoned key; Bob is unaffected by it
        assert_eq!(storage.list_by_user("alice").await.unwrap().len(), 5);
        assert_eq!(storage.list_by_user("bob").await.unwrap().len(), 1);
    }
}
