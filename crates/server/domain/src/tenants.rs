//! Tenant-directory port

use async_trait::async_trait;
use printfleet_shared::ids::TenantId;
use serde_json::{Map, Value};
use thiserror::Error;

/// One tenant eligible for dispatch: identity plus its provisioning
/// program input.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantSeed {
    pub tenant_id: TenantId,
    pub program_input: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Tenant directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Active tenants with pending configuration work.
    async fn eligible_tenants(&self) -> Result<Vec<TenantSeed>, DirectoryError>;
}
