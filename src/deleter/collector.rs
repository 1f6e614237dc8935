use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{DeleteBatch, DeleteTask};

/// Single owner of the pending batch.
///
/// Waits on the ingress queue, the flush ticker and the shutdown token,
/// whichever fires first. Dropping the collector drops the only flush
/// sender, which closes the flush queue for the processors.
pub(crate) struct Collector {
    pub(crate) ingress: mpsc::Receiver<DeleteTask>,
    pub(crate) flush_tx: mpsc::Sender<DeleteBatch>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) batch_size: usize,
    pub(crate) batch_window: Duration,
    pub(crate) pending: DeleteBatch,
}

impl Collector {
    pub(crate) async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.batch_window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first tick which fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    let drained = self.drain_ingress();
                    info!(drained, "Delete collector received shutdown signal, flushing...");
                    break;
                }
                received = self.ingress.recv() => {
                    match received {
                        Some(task) => {
                            self.pending.push(task);
                            if self.pending.user_count() >= self.batch_size {
                                self.flush().await;
                                ticker.reset();
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    self.flush().await;
                }
            }
        }

        self.flush().await;
        debug!("Delete collector stopped");
    }

    /// Pull everything already queued so tasks accepted before shutdown are
    /// still applied.
    fn drain_ingress(&mut self) -> usize {
        self.ingress.close();
        let mut drained = 0;
        while let Ok(task) = self.ingress.try_recv() {
            self.pending.push(task);
            drained += 1;
        }
        drained
    }

    async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.pending);
        debug!(
            users = batch.user_count(),
            keys = batch.key_count(),
            "Flushing delete batch"
        );

        if self.flush_tx.send(batch).await.is_err() {
            error!("Flush queue closed, dropping delete batch");
        }
    }
}
