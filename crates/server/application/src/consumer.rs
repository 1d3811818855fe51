//! Queue consumer loop
//!
//! Pumps deliveries from the work queue into the [`Worker`] and settles each
//! one against the queue: acknowledged when processed, released for
//! redelivery when failed. The substrate's receive-count policy, not this
//! loop, decides when an item stops coming back.

use crate::worker::Worker;
use printfleet_server_domain::queue::{QueueError, WorkQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Configuration for the consumer loop
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Deliveries pulled per poll.
    pub batch_size: usize,
    /// Idle delay between empty polls.
    pub poll_interval: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// What one pump iteration did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumerReport {
    pub received: usize,
    pub acknowledged: usize,
    pub released: usize,
}

pub struct QueueConsumer {
    queue: Arc<dyn WorkQueue>,
    worker: Arc<Worker>,
    config: ConsumerConfig,
}

impl QueueConsumer {
    pub fn new(queue: Arc<dyn WorkQueue>, worker: Arc<Worker>, config: ConsumerConfig) -> Self {
        Self {
            queue,
            worker,
            config,
        }
    }

    /// Receives one batch, processes it, settles every delivery.
    pub async fn run_once(&self) -> Result<ConsumerReport, QueueError> {
        let deliveries = self.queue.receive(self.config.batch_size).await?;
        if deliveries.is_empty() {
            return Ok(ConsumerReport::default());
        }

        let mut report = ConsumerReport {
            received: deliveries.len(),
            ..ConsumerReport::default()
        };

        let ids: Vec<_> = deliveries
            .iter()
            .map(|delivery| delivery.item.dispatch_id.clone())
            .collect();

        let outcome = self.worker.on_batch(deliveries).await;

        for dispatch_id in ids {
            if outcome.failed_ids.contains(&dispatch_id) {
                self.queue.release(&dispatch_id).await?;
                report.released += 1;
            } else {
                self.queue.acknowledge(&dispatch_id).await?;
                report.acknowledged += 1;
            }
        }

        debug!(
            received = report.received,
            acknowledged = report.acknowledged,
            released = report.released,
            "Batch settled"
        );

        Ok(report)
    }

    /// Polls until `shutdown` flips to true. Queue errors are logged and the
    /// loop backs off rather than dying; the substrate redelivers whatever
    /// was in flight.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("🚀 Queue consumer started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.run_once().await {
                Ok(report) => report.received == 0,
                Err(queue_error) => {
                    warn!(error = %queue_error, "Queue poll failed, backing off");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }

        info!("Queue consumer stopped");
    }
}
