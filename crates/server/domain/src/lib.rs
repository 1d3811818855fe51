pub mod provision;
pub mod publisher;
pub mod queue;
pub mod signer;
pub mod tenants;
pub mod work;

pub use provision::{ExecutionError, ProvisionRunner};
pub use publisher::{EventPublisher, MAX_EVENTS_PER_PUBLISH, MAX_PUBLISH_BYTES, PublishError};
pub use queue::{QueueError, WorkQueue};
pub use signer::{ChannelSigner, DispatchRegistry};
pub use tenants::{DirectoryError, TenantDirectory, TenantSeed};
pub use work::{
    BatchSendReport, Delivery, DispatchSummary, FailedEntry, WorkItem, WorkItemCodecError,
};
