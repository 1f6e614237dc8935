use std::time::Duration;

use super::PipelineError;

/// Tuning knobs for the deletion pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfig {
    /// Number of batch processors.
    pub worker_count: usize,
    /// Maximum number of distinct users accumulated before a flush.
    pub batch_size: usize,
    /// Maximum time a non-empty batch waits before being flushed.
    pub batch_window: Duration,
    /// Maximum short keys passed to one storage call.
    pub sub_batch_size: usize,
    /// Bound on queued delete tasks.
    pub ingress_capacity: usize,
    /// Bound on flushed batches waiting for a processor.
    pub flush_capacity: usize,
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            batch_size: 100,
            batch_window: Duration::from_secs(2),
            sub_batch_size: 50,
            ingress_capacity: 10_000,
            flush_capacity: 100,
        }
    }
}

impl DeleteConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let zero = [
            ("worker_count", self.worker_count),
            ("batch_size", self.batch_size),
            ("sub_batch_size", self.sub_batch_size),
            ("ingress_capacity", self.ingress_capacity),
            ("flush_capacity", self.flush_capacity),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        if let Some((name, _)) = zero {
            return Err(PipelineError::InvalidConfig(name));
        }
        if self.batch_window.is_zero() {
            return Err(PipelineError::InvalidConfig("batch_window"));
        }
        Ok(())
    }

    /// Permits shared by every processor for concurrent per-user updates.
    pub(crate) fn user_concurrency(&self) -> usize {
        self.worker_count * 2
    }
}
