//! Work-queue port
//!
//! At-least-once delivery with partial-batch enqueue reporting. Redelivery
//! is driven by the substrate's visibility/receive-count mechanism; the
//! consumer only acknowledges or releases.

use crate::work::{BatchSendReport, Delivery, WorkItem};
use async_trait::async_trait;
use printfleet_shared::ids::DispatchId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed message body: {0}")]
    MalformedBody(String),

    #[error("Unknown in-flight delivery: {0}")]
    UnknownDelivery(DispatchId),
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueues a batch. Entries the substrate rejects are listed in the
    /// report's `failed`; the call itself only errors when the whole queue
    /// is unreachable.
    async fn send_batch(&self, items: Vec<WorkItem>) -> Result<BatchSendReport, QueueError>;

    /// Receives up to `max` deliveries, marking them in-flight and bumping
    /// their receive count.
    async fn receive(&self, max: usize) -> Result<Vec<Delivery>, QueueError>;

    /// Deletes a successfully processed delivery.
    async fn acknowledge(&self, dispatch_id: &DispatchId) -> Result<(), QueueError>;

    /// Returns a failed delivery for redelivery. The substrate moves items
    /// whose receive count is exhausted to its dead-letter destination
    /// instead.
    async fn release(&self, dispatch_id: &DispatchId) -> Result<(), QueueError>;
}
