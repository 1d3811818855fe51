//! Batch worker
//!
//! Consumes queue batches and executes the unit of work per item, publishing
//! a correlated outcome event for every attempt. Items in a batch run as
//! independent tasks: a stuck, failing or panicking item never blocks or
//! crashes its siblings, and the batch call always returns an outcome rather
//! than raising.

use printfleet_server_domain::provision::ProvisionRunner;
use printfleet_server_domain::publisher::EventPublisher;
use printfleet_server_domain::work::Delivery;
use printfleet_shared::channel::Channel;
use printfleet_shared::events::Event;
use printfleet_shared::ids::DispatchId;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Which pipeline this worker serves; selects the result-event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkKind {
    InfraProvision,
    PapercutSync,
}

impl WorkKind {
    fn result_event(
        &self,
        dispatch_id: DispatchId,
        success: bool,
        retrying: Option<bool>,
        error: Option<String>,
    ) -> Event {
        match self {
            WorkKind::InfraProvision => Event::InfraProvisionResult {
                dispatch_id,
                success,
                retrying,
                error,
            },
            WorkKind::PapercutSync => Event::PapercutSyncResult {
                dispatch_id,
                success,
                retrying,
                error,
            },
        }
    }
}

/// Configuration for the worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Mirrors the queue's max-receive policy; a failure below this count is
    /// published as a retry notice, at or above it as terminal.
    pub max_receive_count: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_receive_count: 3,
        }
    }
}

/// Result of processing one batch: the ids the queue should redeliver.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub failed_ids: Vec<DispatchId>,
}

pub struct Worker {
    kind: WorkKind,
    runner: Arc<dyn ProvisionRunner>,
    publisher: Arc<dyn EventPublisher>,
    config: WorkerConfig,
}

enum ItemOutcome {
    Succeeded,
    Failed,
}

impl Worker {
    pub fn new(
        kind: WorkKind,
        runner: Arc<dyn ProvisionRunner>,
        publisher: Arc<dyn EventPublisher>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            kind,
            runner,
            publisher,
            config,
        }
    }

    /// Processes one delivered batch, all items concurrently.
    ///
    /// Every failed item lands in `failed_ids` so the substrate redelivers
    /// it; redelivery is what turns `retrying` true on the next attempt, and
    /// the substrate's own max-receive policy is what eventually stops it.
    pub async fn on_batch(&self, batch: Vec<Delivery>) -> BatchOutcome {
        let mut tasks = Vec::with_capacity(batch.len());

        for delivery in batch {
            let dispatch_id = delivery.item.dispatch_id.clone();
            let receive_count = delivery.receive_count;
            let kind = self.kind;
            let runner = self.runner.clone();
            let publisher = self.publisher.clone();
            let max_receive_count = self.config.max_receive_count;

            let handle = tokio::spawn(async move {
                process_one(kind, runner, publisher, delivery, max_receive_count).await
            });
            tasks.push((dispatch_id, receive_count, handle));
        }

        let mut failed_ids = Vec::new();
        for (dispatch_id, receive_count, handle) in tasks {
            match handle.await {
                Ok(ItemOutcome::Succeeded) => {}
                Ok(ItemOutcome::Failed) => failed_ids.push(dispatch_id),
                Err(join_error) => {
                    // The task itself died (panic). Publish the failure on
                    // its behalf and hand the item back for redelivery.
                    error!(
                        dispatch_id = %dispatch_id,
                        error = %join_error,
                        "❌ Work task aborted"
                    );
                    let retrying = receive_count < self.config.max_receive_count;
                    let event = self.kind.result_event(
                        dispatch_id.clone(),
                        false,
                        Some(retrying),
                        Some("work task aborted".to_string()),
                    );
                    if let Err(publish_error) = self
                        .publisher
                        .publish(&Channel::events(&dispatch_id), &[event])
                        .await
                    {
                        error!(
                            dispatch_id = %dispatch_id,
                            error = %publish_error,
                            "Failed to publish abort notice"
                        );
                    }
                    failed_ids.push(dispatch_id);
                }
            }
        }

        BatchOutcome { failed_ids }
    }
}

async fn process_one(
    kind: WorkKind,
    runner: Arc<dyn ProvisionRunner>,
    publisher: Arc<dyn EventPublisher>,
    delivery: Delivery,
    max_receive_count: u32,
) -> ItemOutcome {
    let dispatch_id = delivery.item.dispatch_id.clone();
    let channel = Channel::events(&dispatch_id);

    match runner.run(&delivery).await {
        Ok(()) => {
            info!(
                dispatch_id = %dispatch_id,
                tenant_id = %delivery.item.tenant_id,
                "✅ Work item completed"
            );
            let event = kind.result_event(dispatch_id.clone(), true, None, None);
            if let Err(publish_error) = publisher.publish(&channel, &[event]).await {
                // The work itself succeeded; re-running it to recover a lost
                // courtesy notification would be worse than the loss.
                error!(
                    dispatch_id = %dispatch_id,
                    error = %publish_error,
                    "Failed to publish success event"
                );
            }
            ItemOutcome::Succeeded
        }
        Err(execution_error) => {
            let retrying = delivery.receive_count < max_receive_count;
            warn!(
                dispatch_id = %dispatch_id,
                tenant_id = %delivery.item.tenant_id,
                receive_count = delivery.receive_count,
                retrying,
                error = %execution_error,
                "Work item failed"
            );
            let event = kind.result_event(
                dispatch_id.clone(),
                false,
                Some(retrying),
                Some(execution_error.message().to_string()),
            );
            if let Err(publish_error) = publisher.publish(&channel, &[event]).await {
                // Must not mask the execution failure: the item still goes
                // back for redelivery.
                error!(
                    dispatch_id = %dispatch_id,
                    error = %publish_error,
                    "Failed to publish failure event"
                );
            }
            ItemOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use printfleet_server_domain::provision::ExecutionError;
    use printfleet_server_domain::publisher::PublishError;
    use printfleet_server_domain::work::WorkItem;
    use printfleet_shared::ids::TenantId;
    use std::sync::Mutex;

    struct CollectingPublisher {
        published: Mutex<Vec<(Channel, Event)>>,
        fail: bool,
    }

    impl CollectingPublisher {
        fn new() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn events(&self) -> Vec<(Channel, Event)> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventPublisher for CollectingPublisher {
        async fn publish(&self, channel: &Channel, events: &[Event]) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::Transport("wire down".to_string()));
            }
            let mut published = self.published.lock().unwrap();
            for event in events {
                published.push((channel.clone(), event.clone()));
            }
            Ok(())
        }
    }

    /// Fails the tenants it is told to fail; panics on demand.
    struct ScriptedRunner {
        fail: Vec<TenantId>,
        panic_on: Vec<TenantId>,
    }

    #[async_trait]
    impl ProvisionRunner for ScriptedRunner {
        async fn run(&self, delivery: &Delivery) -> Result<(), ExecutionError> {
            if self.panic_on.contains(&delivery.item.tenant_id) {
                panic!("scripted panic");
            }
            if self.fail.contains(&delivery.item.tenant_id) {
                return Err(ExecutionError::Failed("stack update failed".to_string()));
            }
            Ok(())
        }
    }

    fn delivery(receive_count: u32) -> Delivery {
        Delivery {
            item: WorkItem::new(TenantId::new(), serde_json::Map::new()),
            receive_count,
        }
    }

    fn worker(runner: ScriptedRunner, publisher: Arc<CollectingPublisher>) -> Worker {
        Worker::new(
            WorkKind::InfraProvision,
            Arc::new(runner),
            publisher,
            WorkerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_success_publishes_terminal_success() {
        let publisher = Arc::new(CollectingPublisher::new());
        let worker = worker(
            ScriptedRunner {
                fail: Vec::new(),
                panic_on: Vec::new(),
            },
            publisher.clone(),
        );

        let delivery = delivery(1);
        let dispatch_id = delivery.item.dispatch_id.clone();
        let outcome = worker.on_batch(vec![delivery]).await;

        assert!(outcome.failed_ids.is_empty());
        let events = publisher.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Channel::events(&dispatch_id));
        assert_eq!(
            events[0].1,
            Event::InfraProvisionResult {
                dispatch_id,
                success: true,
                retrying: None,
                error: None,
            }
        );
    }

    #[tokio::test]
    async fn test_first_failure_is_a_retry_notice() {
        let publisher = Arc::new(CollectingPublisher::new());
        let d = delivery(1);
        let dispatch_id = d.item.dispatch_id.clone();
        let worker = worker(
            ScriptedRunner {
                fail: vec![d.item.tenant_id.clone()],
                panic_on: Vec::new(),
            },
            publisher.clone(),
        );

        let outcome = worker.on_batch(vec![d]).await;

        assert_eq!(outcome.failed_ids, vec![dispatch_id.clone()]);
        let events = publisher.events();
        assert!(events[0].1.is_retry_notice());
        assert_eq!(
            events[0].1,
            Event::InfraProvisionResult {
                dispatch_id,
                success: false,
                retrying: Some(true),
                error: Some("stack update failed".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_exhausted_failure_is_terminal() {
        let publisher = Arc::new(CollectingPublisher::new());
        let d = delivery(3);
        let worker = worker(
            ScriptedRunner {
                fail: vec![d.item.tenant_id.clone()],
                panic_on: Vec::new(),
            },
            publisher.clone(),
        );

        let outcome = worker.on_batch(vec![d]).await;

        // Still handed back: the substrate's max-receive policy is the one
        // that stops redelivery, not the worker.
        assert_eq!(outcome.failed_ids.len(), 1);
        assert!(publisher.events()[0].1.is_terminal_failure());
    }

    #[tokio::test]
    async fn test_one_bad_item_does_not_poison_the_batch() {
        let publisher = Arc::new(CollectingPublisher::new());
        let good = delivery(1);
        let bad = delivery(1);
        let panicking = delivery(1);
        let good_id = good.item.dispatch_id.clone();
        let bad_id = bad.item.dispatch_id.clone();
        let panicking_id = panicking.item.dispatch_id.clone();

        let worker = worker(
            ScriptedRunner {
                fail: vec![bad.item.tenant_id.clone()],
                panic_on: vec![panicking.item.tenant_id.clone()],
            },
            publisher.clone(),
        );

        let outcome = worker.on_batch(vec![good, bad, panicking]).await;

        assert!(!outcome.failed_ids.contains(&good_id));
        assert!(outcome.failed_ids.contains(&bad_id));
        assert!(outcome.failed_ids.contains(&panicking_id));
        // Every item produced exactly one event, including the panicked one.
        assert_eq!(publisher.events().len(), 3);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_mask_execution_outcome() {
        let publisher = Arc::new(CollectingPublisher::failing());
        let failing = delivery(1);
        let succeeding = delivery(1);
        let failing_id = failing.item.dispatch_id.clone();

        let worker = worker(
            ScriptedRunner {
                fail: vec![failing.item.tenant_id.clone()],
                panic_on: Vec::new(),
            },
            publisher.clone(),
        );

        let outcome = worker.on_batch(vec![failing, succeeding]).await;

        // The failed execution is still reported for redelivery; the
        // successful one is not, even though both publishes failed.
        assert_eq!(outcome.failed_ids, vec![failing_id]);
    }

    #[tokio::test]
    async fn test_sync_worker_publishes_sync_results() {
        let publisher = Arc::new(CollectingPublisher::new());
        let worker = Worker::new(
            WorkKind::PapercutSync,
            Arc::new(ScriptedRunner {
                fail: Vec::new(),
                panic_on: Vec::new(),
            }),
            publisher.clone(),
            WorkerConfig::default(),
        );

        worker.on_batch(vec![delivery(1)]).await;

        assert!(matches!(
            publisher.events()[0].1,
            Event::PapercutSyncResult { success: true, .. }
        ));
    }
}
