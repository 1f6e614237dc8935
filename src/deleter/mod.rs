//! Asynchronous, batched deletion of short URLs.
//!
//! Delete requests are accepted without touching storage: handlers submit a
//! [`DeleteTask`] into a bounded ingress queue and return immediately. A
//! single collector task folds tasks into a per-user [`DeleteBatch`] and
//! flushes it when it holds `batch_size` users or when `batch_window`
//! elapses. A pool of processors drains flushed batches and tombstones the
//! keys in `sub_batch_size` chunks, with per-user work bounded by a shared
//! semaphore.
//!
//! ```text
//! submit ──► [ingress queue] ──► collector ──► [flush queue] ──► processors ──► storage
//! ```

mod collector;
mod config;
mod pipeline;
mod processor;

pub use config::DeleteConfig;
pub use pipeline::{DeletePipeline, PipelineError, PipelineState, StopOutcome};

use std::collections::HashMap;

/// A user's request to tombstone some of their short keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTask {
    pub user_id: String,
    pub short_keys: Vec<String>,
}

impl DeleteTask {
    pub fn new(user_id: impl Into<String>, short_keys: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            short_keys,
        }
    }
}

/// Short keys accumulated per user between two flushes.
///
/// Keys are appended in submission order, so a user's slice preserves the
/// order in which their tasks went through the ingress queue.
#[derive(Debug, Default)]
pub struct DeleteBatch {
    users: HashMap<String, Vec<String>>,
}

impl DeleteBatch {
    pub fn push(&mut self, task: DeleteTask) {
        self.users
            .entry(task.user_id)
            .or_default()
            .extend(task.short_keys);
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn key_count(&self) -> usize {
        self.users.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn keys_for(&self, user_id: &str) -> Option<&[String]> {
        self.users.get(user_id).map(Vec::as_slice)
    }

    pub fn into_users(self) -> impl Iterator<Item = (String, Vec<String>)> {
        self.users.into_iter()
    }
}
