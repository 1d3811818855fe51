//! Setup backend port
//!
//! The API surface the workflow drives: registration, the two dispatches,
//! the readiness probe and final activation. Transport-agnostic on purpose;
//! tests inject in-process implementations.

use async_trait::async_trait;
use printfleet_shared::ids::DispatchId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait SetupBackend: Send + Sync {
    /// Registers the tenant and dispatches its infrastructure provisioning.
    /// Returns the dispatch to correlate on.
    async fn register(&self) -> Result<DispatchId, BackendError>;

    /// Dispatches the initial data synchronization. Returns the dispatch to
    /// correlate on.
    async fn dispatch_sync(&self) -> Result<DispatchId, BackendError>;

    /// Probes the tenant backend's readiness signal.
    async fn healthcheck(&self) -> Result<bool, BackendError>;

    /// Flips the tenant active; no further I/O after this.
    async fn activate(&self) -> Result<(), BackendError>;
}
