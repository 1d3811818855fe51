//! Tenant work dispatcher
//!
//! Enumerates eligible tenants, partitions them into queue-sized batches and
//! enqueues one work item per tenant. A batch-level partial failure is not a
//! whole-run failure: undeliverable entries are aggregated across batches and
//! returned in the summary for operators. The dispatcher never retries
//! enqueue failures itself; the substrate's redelivery machinery does not
//! apply to items that were never accepted.

use printfleet_server_domain::queue::{QueueError, WorkQueue};
use printfleet_server_domain::tenants::{DirectoryError, TenantDirectory};
use printfleet_server_domain::work::{DispatchSummary, FailedEntry, WorkItem};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Configuration for the dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Entries per enqueue batch; capped by the substrate at 10.
    pub batch_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { batch_size: 10 }
    }
}

/// Errors that abort a dispatch run before any summary can be produced.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub struct Dispatcher {
    tenants: Arc<dyn TenantDirectory>,
    queue: Arc<dyn WorkQueue>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        tenants: Arc<dyn TenantDirectory>,
        queue: Arc<dyn WorkQueue>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            tenants,
            queue,
            config,
        }
    }

    /// Enqueues one work item per eligible tenant.
    ///
    /// Returns a summary whose `success` flag is false when any entry failed
    /// to enqueue; the remaining entries are unaffected.
    pub async fn dispatch_all(&self) -> Result<DispatchSummary, DispatchError> {
        let seeds = self.tenants.eligible_tenants().await?;
        info!(tenants = seeds.len(), "🚀 Starting dispatch run");

        let items: Vec<WorkItem> = seeds
            .into_iter()
            .map(|seed| WorkItem::new(seed.tenant_id, seed.program_input))
            .collect();

        let mut dispatched = Vec::new();
        let mut failed: Vec<FailedEntry> = Vec::new();

        for chunk in items.chunks(self.config.batch_size.max(1)) {
            let report = self.queue.send_batch(chunk.to_vec()).await?;

            if !report.failed.is_empty() {
                warn!(
                    failed = report.failed.len(),
                    batch = chunk.len(),
                    "Batch partially failed to enqueue"
                );
            }

            dispatched.extend(report.dispatched);
            failed.extend(report.failed);
        }

        let success = failed.is_empty();
        if success {
            info!(dispatched = dispatched.len(), "✅ Dispatch run complete");
        } else {
            for entry in &failed {
                error!(
                    dispatch_id = %entry.dispatch_id,
                    tenant_id = %entry.tenant_id,
                    reason = %entry.message,
                    "Failed to enqueue work item"
                );
            }
        }

        Ok(DispatchSummary {
            success,
            dispatched,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use printfleet_server_domain::tenants::TenantSeed;
    use printfleet_server_domain::work::{BatchSendReport, Delivery};
    use printfleet_shared::ids::{DispatchId, TenantId};
    use std::sync::Mutex;

    struct FixedDirectory(Vec<TenantSeed>);

    #[async_trait]
    impl TenantDirectory for FixedDirectory {
        async fn eligible_tenants(&self) -> Result<Vec<TenantSeed>, DirectoryError> {
            Ok(self.0.clone())
        }
    }

    /// Records batch sizes and rejects the tenants it is told to reject.
    struct RecordingQueue {
        batches: Mutex<Vec<usize>>,
        reject: Vec<TenantId>,
    }

    #[async_trait]
    impl WorkQueue for RecordingQueue {
        async fn send_batch(&self, items: Vec<WorkItem>) -> Result<BatchSendReport, QueueError> {
            self.batches.lock().unwrap().push(items.len());
            let mut report = BatchSendReport::default();
            for item in items {
                if self.reject.contains(&item.tenant_id) {
                    report.failed.push(FailedEntry {
                        dispatch_id: item.dispatch_id,
                        tenant_id: item.tenant_id,
                        message: "throttled".to_string(),
                    });
                } else {
                    report.dispatched.push(item.dispatch_id);
                }
            }
            Ok(report)
        }

        async fn receive(&self, _max: usize) -> Result<Vec<Delivery>, QueueError> {
            Ok(Vec::new())
        }

        async fn acknowledge(&self, _dispatch_id: &DispatchId) -> Result<(), QueueError> {
            Ok(())
        }

        async fn release(&self, _dispatch_id: &DispatchId) -> Result<(), QueueError> {
            Ok(())
        }
    }

    fn seeds(n: usize) -> Vec<TenantSeed> {
        (0..n)
            .map(|_| TenantSeed {
                tenant_id: TenantId::new(),
                program_input: serde_json::Map::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_all_tenants_enqueued_in_batches_of_ten() {
        let seeds = seeds(23);
        let queue = Arc::new(RecordingQueue {
            batches: Mutex::new(Vec::new()),
            reject: Vec::new(),
        });
        let dispatcher = Dispatcher::new(
            Arc::new(FixedDirectory(seeds)),
            queue.clone(),
            DispatcherConfig::default(),
        );

        let summary = dispatcher.dispatch_all().await.unwrap();

        assert!(summary.success);
        assert_eq!(summary.dispatched.len(), 23);
        assert!(summary.failed.is_empty());
        assert_eq!(*queue.batches.lock().unwrap(), vec![10, 10, 3]);
    }

    #[tokio::test]
    async fn test_partial_failure_is_aggregated_not_fatal() {
        let seeds = seeds(10);
        // Items 3 and 7 (0-indexed) fail to enqueue.
        let reject = vec![seeds[3].tenant_id.clone(), seeds[7].tenant_id.clone()];
        let queue = Arc::new(RecordingQueue {
            batches: Mutex::new(Vec::new()),
            reject: reject.clone(),
        });
        let dispatcher = Dispatcher::new(
            Arc::new(FixedDirectory(seeds)),
            queue,
            DispatcherConfig::default(),
        );

        let summary = dispatcher.dispatch_all().await.unwrap();

        assert!(!summary.success);
        assert_eq!(summary.dispatched.len(), 8);
        assert_eq!(summary.failed.len(), 2);
        let failed_tenants: Vec<_> = summary
            .failed
            .iter()
            .map(|entry| entry.tenant_id.clone())
            .collect();
        assert_eq!(failed_tenants, reject);
    }

    #[tokio::test]
    async fn test_empty_directory_is_a_successful_noop() {
        let queue = Arc::new(RecordingQueue {
            batches: Mutex::new(Vec::new()),
            reject: Vec::new(),
        });
        let dispatcher = Dispatcher::new(
            Arc::new(FixedDirectory(Vec::new())),
            queue.clone(),
            DispatcherConfig::default(),
        );

        let summary = dispatcher.dispatch_all().await.unwrap();
        assert!(summary.success);
        assert!(summary.dispatched.is_empty());
        assert!(queue.batches.lock().unwrap().is_empty());
    }
}
