//! In-memory work queue with SQS-style semantics
//!
//! Reference/test adapter: at-least-once delivery, approximate receive
//! counts, an inspectable dead-letter buffer, and per-tenant failure
//! injection for partial-batch tests. Entries are stored as their wire
//! bodies so the enqueue codec is exercised on every pass through the queue.
//!
//! Redelivery happens on `release` only; there is no background visibility
//! timer, which keeps at-least-once paths deterministic under test.

use async_trait::async_trait;
use printfleet_server_domain::queue::{QueueError, WorkQueue};
use printfleet_server_domain::work::{BatchSendReport, Delivery, FailedEntry, WorkItem};
use printfleet_shared::config::QueueConfig;
use printfleet_shared::ids::{DispatchId, TenantId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct QueueEntry {
    dispatch_id: DispatchId,
    body: String,
    receive_count: u32,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<QueueEntry>,
    in_flight: HashMap<DispatchId, QueueEntry>,
    dead: Vec<QueueEntry>,
    fail_tenants: HashSet<TenantId>,
}

pub struct InMemoryWorkQueue {
    state: Mutex<QueueState>,
    config: QueueConfig,
}

impl InMemoryWorkQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            config,
        }
    }

    /// Makes every future enqueue for `tenant_id` fail, for partial-batch
    /// failure tests.
    pub fn fail_tenant(&self, tenant_id: TenantId) {
        self.state.lock().unwrap().fail_tenants.insert(tenant_id);
    }

    /// Dispatch ids currently parked in the dead-letter buffer.
    pub fn dead_letters(&self) -> Vec<DispatchId> {
        self.state
            .lock()
            .unwrap()
            .dead
            .iter()
            .map(|entry| entry.dispatch_id.clone())
            .collect()
    }

    /// Entries waiting for delivery.
    pub fn ready_len(&self) -> usize {
        self.state.lock().unwrap().ready.len()
    }

    /// Entries delivered but not yet settled.
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().unwrap().in_flight.len()
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn send_batch(&self, items: Vec<WorkItem>) -> Result<BatchSendReport, QueueError> {
        let mut report = BatchSendReport::default();
        let mut state = self.state.lock().unwrap();

        for item in items {
            if state.fail_tenants.contains(&item.tenant_id) {
                report.failed.push(FailedEntry {
                    dispatch_id: item.dispatch_id,
                    tenant_id: item.tenant_id,
                    message: "injected enqueue failure".to_string(),
                });
                continue;
            }

            let body = item
                .to_message_body()
                .map_err(|e| QueueError::MalformedBody(e.to_string()))?;
            state.ready.push_back(QueueEntry {
                dispatch_id: item.dispatch_id.clone(),
                body,
                receive_count: 0,
            });
            report.dispatched.push(item.dispatch_id);
        }

        Ok(report)
    }

    async fn receive(&self, max: usize) -> Result<Vec<Delivery>, QueueError> {
        let mut state = self.state.lock().unwrap();
        let mut deliveries = Vec::new();

        while deliveries.len() < max {
            let Some(mut entry) = state.ready.pop_front() else {
                break;
            };
            entry.receive_count += 1;

            let item = match WorkItem::from_message_body(&entry.body) {
                Ok(item) => item,
                Err(codec_error) => {
                    // A body this queue cannot read will never become
                    // readable; park it instead of redelivering forever.
                    warn!(
                        dispatch_id = %entry.dispatch_id,
                        error = %codec_error,
                        "Unreadable message body moved to dead-letter buffer"
                    );
                    state.dead.push(entry);
                    continue;
                }
            };

            state.in_flight.insert(entry.dispatch_id.clone(), entry.clone());
            deliveries.push(Delivery {
                item,
                receive_count: entry.receive_count,
            });
        }

        Ok(deliveries)
    }

    async fn acknowledge(&self, dispatch_id: &DispatchId) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        state
            .in_flight
            .remove(dispatch_id)
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownDelivery(dispatch_id.clone()))
    }

    async fn release(&self, dispatch_id: &DispatchId) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .in_flight
            .remove(dispatch_id)
            .ok_or_else(|| QueueError::UnknownDelivery(dispatch_id.clone()))?;

        if entry.receive_count >= self.config.max_receive_count {
            debug!(
                dispatch_id = %entry.dispatch_id,
                receive_count = entry.receive_count,
                "Receive count exhausted, moving to dead-letter buffer"
            );
            state.dead.push(entry);
        } else {
            state.ready.push_back(entry);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> WorkItem {
        WorkItem::new(TenantId::new(), serde_json::Map::new())
    }

    fn queue() -> InMemoryWorkQueue {
        InMemoryWorkQueue::new(QueueConfig::default())
    }

    #[tokio::test]
    async fn test_send_receive_acknowledge() {
        let queue = queue();
        let work = item();
        let dispatch_id = work.dispatch_id.clone();

        let report = queue.send_batch(vec![work.clone()]).await.unwrap();
        assert_eq!(report.dispatched, vec![dispatch_id.clone()]);
        assert!(report.failed.is_empty());

        let deliveries = queue.receive(10).await.unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].item, work);
        assert_eq!(deliveries[0].receive_count, 1);

        queue.acknowledge(&dispatch_id).await.unwrap();
        assert_eq!(queue.ready_len(), 0);
        assert_eq!(queue.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_release_increments_receive_count() {
        let queue = queue();
        let work = item();
        let dispatch_id = work.dispatch_id.clone();
        queue.send_batch(vec![work]).await.unwrap();

        for expected_count in 1..=2 {
            let deliveries = queue.receive(10).await.unwrap();
            assert_eq!(deliveries[0].receive_count, expected_count);
            queue.release(&dispatch_id).await.unwrap();
        }

        let deliveries = queue.receive(10).await.unwrap();
        assert_eq!(deliveries[0].receive_count, 3);
    }

    #[tokio::test]
    async fn test_exhausted_release_dead_letters() {
        let queue = queue();
        let work = item();
        let dispatch_id = work.dispatch_id.clone();
        queue.send_batch(vec![work]).await.unwrap();

        for _ in 0..3 {
            let deliveries = queue.receive(10).await.unwrap();
            assert_eq!(deliveries.len(), 1);
            queue.release(&dispatch_id).await.unwrap();
        }

        // Third release hit max_receive_count: nothing left to deliver.
        assert!(queue.receive(10).await.unwrap().is_empty());
        assert_eq!(queue.dead_letters(), vec![dispatch_id]);
    }

    #[tokio::test]
    async fn test_injected_failures_report_partially() {
        let queue = queue();
        let good = item();
        let bad = item();
        queue.fail_tenant(bad.tenant_id.clone());

        let report = queue.send_batch(vec![good.clone(), bad.clone()]).await.unwrap();

        assert_eq!(report.dispatched, vec![good.dispatch_id]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].dispatch_id, bad.dispatch_id);
    }

    #[tokio::test]
    async fn test_settling_unknown_delivery_errors() {
        let queue = queue();
        let ghost = DispatchId::new();
        assert!(matches!(
            queue.acknowledge(&ghost).await,
            Err(QueueError::UnknownDelivery(_))
        ));
        assert!(matches!(
            queue.release(&ghost).await,
            Err(QueueError::UnknownDelivery(_))
        ));
    }

    #[tokio::test]
    async fn test_receive_respects_max() {
        let queue = queue();
        queue
            .send_batch((0..5).map(|_| item()).collect())
            .await
            .unwrap();
        assert_eq!(queue.receive(3).await.unwrap().len(), 3);
        assert_eq!(queue.receive(3).await.unwrap().len(), 2);
    }
}
