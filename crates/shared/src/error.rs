use crate::ids::{DispatchId, TenantId};

#[derive(thiserror::Error, Debug)]
pub enum SharedError {
    #[error("Dispatch not found: {dispatch_id}")]
    DispatchNotFound { dispatch_id: DispatchId },

    #[error("Tenant not found: {tenant_id}")]
    TenantNotFound { tenant_id: TenantId },

    #[error("Invalid channel: {channel}")]
    InvalidChannel { channel: String },
}
