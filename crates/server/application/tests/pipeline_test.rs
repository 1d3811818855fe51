//! Dispatcher → queue → worker → publisher pipeline tests over the
//! in-memory queue adapter.

use async_trait::async_trait;
use printfleet_server_application::{
    ConsumerConfig, Dispatcher, DispatcherConfig, QueueConsumer, WorkKind, Worker, WorkerConfig,
};
use printfleet_server_domain::provision::{ExecutionError, ProvisionRunner};
use printfleet_server_domain::publisher::{EventPublisher, PublishError};
use printfleet_server_domain::tenants::{DirectoryError, TenantDirectory, TenantSeed};
use printfleet_server_domain::work::Delivery;
use printfleet_server_infrastructure::queue::InMemoryWorkQueue;
use printfleet_shared::channel::Channel;
use printfleet_shared::config::QueueConfig;
use printfleet_shared::events::Event;
use printfleet_shared::ids::TenantId;
use std::sync::{Arc, Mutex};

struct FixedDirectory(Vec<TenantSeed>);

#[async_trait]
impl TenantDirectory for FixedDirectory {
    async fn eligible_tenants(&self) -> Result<Vec<TenantSeed>, DirectoryError> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
struct CollectingPublisher {
    published: Mutex<Vec<(Channel, Event)>>,
}

impl CollectingPublisher {
    fn events(&self) -> Vec<Event> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for CollectingPublisher {
    async fn publish(&self, channel: &Channel, events: &[Event]) -> Result<(), PublishError> {
        let mut published = self.published.lock().unwrap();
        for event in events {
            published.push((channel.clone(), event.clone()));
        }
        Ok(())
    }
}

struct FailTenantsRunner(Vec<TenantId>);

#[async_trait]
impl ProvisionRunner for FailTenantsRunner {
    async fn run(&self, delivery: &Delivery) -> Result<(), ExecutionError> {
        if self.0.contains(&delivery.item.tenant_id) {
            return Err(ExecutionError::Failed("stack update failed".to_string()));
        }
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

fn pipeline(
    seeds: Vec<TenantSeed>,
    failing: Vec<TenantId>,
) -> (
    Dispatcher,
    QueueConsumer,
    Arc<InMemoryWorkQueue>,
    Arc<CollectingPublisher>,
) {
    let queue = Arc::new(InMemoryWorkQueue::new(QueueConfig::default()));
    let publisher = Arc::new(CollectingPublisher::default());
    let dispatcher = Dispatcher::new(
        Arc::new(FixedDirectory(seeds)),
        queue.clone(),
        DispatcherConfig::default(),
    );
    let worker = Arc::new(Worker::new(
        WorkKind::InfraProvision,
        Arc::new(FailTenantsRunner(failing)),
        publisher.clone(),
        WorkerConfig::default(),
    ));
    let consumer = QueueConsumer::new(queue.clone(), worker, ConsumerConfig::default());
    (dispatcher, consumer, queue, publisher)
}

#[tokio::test]
async fn test_happy_path_publishes_one_terminal_success_per_tenant() {
    printfleet_server_infrastructure::telemetry::init_tracing(
        &printfleet_shared::config::LoggingConfig::default(),
    );
    let (dispatcher, consumer, queue, publisher) = pipeline(seeds(12), Vec::new());

    let summary = dispatcher.dispatch_all().await.unwrap();
    assert!(summary.success);
    assert_eq!(summary.dispatched.len(), 12);

    let first = consumer.run_once().await.unwrap();
    assert_eq!(first.received, 10);
    assert_eq!(first.acknowledged, 10);
    let second = consumer.run_once().await.unwrap();
    assert_eq!(second.received, 2);

    assert_eq!(queue.ready_len(), 0);
    assert_eq!(queue.in_flight_len(), 0);
    assert!(queue.dead_letters().is_empty());

    let events = publisher.events();
    assert_eq!(events.len(), 12);
    assert!(events.iter().all(|event| event.is_success()));
}

#[tokio::test]
async fn test_failing_item_retries_then_dead_letters() {
    let seeds = seeds(1);
    let failing = vec![seeds[0].tenant_id.clone()];
    let (dispatcher, consumer, queue, publisher) = pipeline(seeds, failing);

    let summary = dispatcher.dispatch_all().await.unwrap();
    let dispatch_id = summary.dispatched[0].clone();

    // Attempts 1 and 2 are retry notices, attempt 3 is terminal; the queue
    // then parks the item in its dead-letter buffer.
    for _ in 0..3 {
        let report = consumer.run_once().await.unwrap();
        assert_eq!(report.released, 1);
    }
    assert_eq!(consumer.run_once().await.unwrap().received, 0);

    assert_eq!(queue.dead_letters(), vec![dispatch_id.clone()]);

    let events = publisher.events();
    assert_eq!(events.len(), 3);
    assert!(events[0].is_retry_notice());
    assert!(events[1].is_retry_notice());
    assert!(events[2].is_terminal_failure());
    assert!(
        events
            .iter()
            .all(|event| event.dispatch_id() == Some(&dispatch_id))
    );
}

#[tokio::test]
async fn test_partial_enqueue_failure_leaves_other_tenants_flowing() {
    let seeds = seeds(4);
    let rejected_tenant = seeds[2].tenant_id.clone();
    let (dispatcher, consumer, queue, publisher) = pipeline(seeds, Vec::new());
    queue.fail_tenant(rejected_tenant.clone());

    let summary = dispatcher.dispatch_all().await.unwrap();
    assert!(!summary.success);
    assert_eq!(summary.dispatched.len(), 3);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].tenant_id, rejected_tenant);

    let report = consumer.run_once().await.unwrap();
    assert_eq!(report.acknowledged, 3);
    assert_eq!(publisher.events().len(), 3);
}
