//! Provision-runner port
//!
//! The opaque unit of work behind one delivery: a long-running provisioning
//! operation or a data synchronization. At-least-once invocation: an
//! implementation may see the same item more than once and must tolerate
//! duplicated side effects.

use crate::work::Delivery;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Failed(String),
}

impl ExecutionError {
    pub fn message(&self) -> &str {
        match self {
            ExecutionError::Failed(message) => message,
        }
    }
}

#[async_trait]
pub trait ProvisionRunner: Send + Sync {
    async fn run(&self, delivery: &Delivery) -> Result<(), ExecutionError>;
}
