use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::collector::Collector;
use super::processor::Processor;
use super::{DeleteBatch, DeleteConfig, DeleteTask};
use crate::storage::Storage;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("delete queue is full")]
    Overloaded,
    #[error("delete pipeline is shutting down")]
    ShuttingDown,
    #[error("delete pipeline was already started")]
    AlreadyStarted,
    #[error("invalid delete pipeline setting: {0} must be greater than zero")]
    InvalidConfig(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// How [`DeletePipeline::stop`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Every accepted task reached storage.
    Drained,
    /// The timeout elapsed; outstanding work was abandoned.
    TimedOut,
}

pub struct DeletePipeline {
    config: DeleteConfig,
    storage: Arc<dyn Storage>,
    ingress_tx: mpsc::Sender<DeleteTask>,
    ingress_rx: Mutex<Option<mpsc::Receiver<DeleteTask>>>,
    state: Mutex<PipelineState>,
    shutdown: CancellationToken,
    tasks: Mutex<Option<JoinSet<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DeletePipeline {
    pub fn new(storage: Arc<dyn Storage>, config: DeleteConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let (ingress_tx, ingress_rx) = mpsc::channel(config.ingress_capacity);

        Ok(Self {
            config,
            storage,
            ingress_tx,
            ingress_rx: Mutex::new(Some(ingress_rx)),
            state: Mutex::new(PipelineState::Idle),
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(None),
        })
    }

    pub fn state(&self) -> PipelineState {
        *lock(&self.state)
    }

    /// Spawn the collector and `worker_count` processors.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<(), PipelineError> {
        let mut state = lock(&self.state);
        if *state != PipelineState::Idle {
            return Err(PipelineError::AlreadyStarted);
        }
        let Some(ingress) = lock(&self.ingress_rx).take() else {
            return Err(PipelineError::AlreadyStarted);
        };

        let (flush_tx, flush_rx) = mpsc::channel::<DeleteBatch>(self.config.flush_capacity);
        let mut tasks = JoinSet::new();

        tasks.spawn(
            Collector {
                ingress,
                flush_tx,
                shutdown: self.shutdown.clone(),
                batch_size: self.config.batch_size,
                batch_window: self.config.batch_window,
                pending: DeleteBatch::default(),
            }
            .run(),
        );

        let batches = Arc::new(tokio::sync::Mutex::new(flush_rx));
        let permits = Arc::new(Semaphore::new(self.config.user_concurrency()));
        for id in 0..self.config.worker_count {
            tasks.spawn(
                Processor {
                    id,
                    batches: Arc::clone(&batches),
                    storage: Arc::clone(&self.storage),
                    permits: Arc::clone(&permits),
                    sub_batch_size: self.config.sub_batch_size,
                }
                .run(),
            );
        }

        *lock(&self.tasks) = Some(tasks);
        *state = PipelineState::Running;

        info!(
            workers = self.config.worker_count,
            batch_size = self.config.batch_size,
            batch_window_ms = self.config.batch_window.as_millis() as u64,
            "Delete pipeline started"
        );
        Ok(())
    }

    /// Queue a delete task without waiting.
    ///
    /// Fails with [`PipelineError::Overloaded`] when the ingress queue is
    /// full and with [`PipelineError::ShuttingDown`] once `stop` was called.
    /// Tasks submitted before `start` wait in the queue.
    pub fn submit(&self, task: DeleteTask) -> Result<(), PipelineError> {
        // Holding the state lock orders this send before any shutdown drain
        let state = lock(&self.state);
        if matches!(*state, PipelineState::Stopping | PipelineState::Stopped) {
            return Err(PipelineError::ShuttingDown);
        }
        if task.short_keys.is_empty() {
            return Ok(());
        }

        match self.ingress_tx.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                warn!(
                    user_id = %task.user_id,
                    keys = task.short_keys.len(),
                    "Delete queue full, rejecting task"
                );
                Err(PipelineError::Overloaded)
            }
            Err(TrySendError::Closed(_)) => Err(PipelineError::ShuttingDown),
        }
    }

    /// Stop accepting tasks, flush what was accepted and wait up to
    /// `timeout` for the processors to drain.
    pub async fn stop(&self, timeout: Duration) -> StopOutcome {
        {
            let mut state = lock(&self.state);
            match *state {
                PipelineState::Running => *state = PipelineState::Stopping,
                PipelineState::Idle => {
                    *state = PipelineState::Stopped;
                    let queued = lock(&self.ingress_rx).take().map_or(0, |rx| rx.len());
                    if queued > 0 {
                        warn!(queued, "Delete pipeline stopped before start, dropping queued tasks");
                    }
                    return StopOutcome::Drained;
                }
                PipelineState::Stopping | PipelineState::Stopped => return StopOutcome::Drained,
            }
        }

        info!("Stopping delete pipeline...");
        self.shutdown.cancel();

        let tasks = lock(&self.tasks).take();
        let outcome = match tasks {
            None => StopOutcome::Drained,
            Some(mut tasks) => {
                let drained = tokio::time::timeout(timeout, async {
                    while let Some(joined) = tasks.join_next().await {
                        if let Err(err) = joined {
                            if err.is_panic() {
                                error!(error = %err, "Delete pipeline task panicked");
                            }
                        }
                    }
                })
                .await;

                match drained {
                    Ok(()) => StopOutcome::Drained,
                    Err(_) => {
                        warn!(
                            timeout_ms = timeout.as_millis() as u64,
                            remaining = tasks.len(),
                            "Delete pipeline did not drain in time, abandoning outstanding work"
                        );
                        tasks.abort_all();
                        StopOutcome::TimedOut
                    }
                }
            }
        };

        *lock(&self.state) = PipelineState::Stopped;
        info!(?outcome, "Delete pipeline stopped");
        outcome
    }
}
