//! Channel-signer port
//!
//! Produces short-lived, scope-limited authorization material for exactly
//! one channel and one direction. Fails closed when the principal lacks the
//! underlying capability.

use async_trait::async_trait;
use printfleet_shared::auth::{AuthMaterial, AuthorizationError, Principal, SignDirection};
use printfleet_shared::channel::Channel;
use printfleet_shared::ids::{DispatchId, TenantId};

#[async_trait]
pub trait ChannelSigner: Send + Sync {
    async fn sign(
        &self,
        direction: SignDirection,
        channel: &Channel,
        principal: &Principal,
    ) -> Result<AuthMaterial, AuthorizationError>;
}

/// Ownership oracle consulted when a tenant- or user-scoped principal asks
/// for access to an `/events/{dispatchId}` channel.
pub trait DispatchRegistry: Send + Sync {
    fn tenant_of(&self, dispatch_id: &DispatchId) -> Option<TenantId>;

    fn record(&self, dispatch_id: DispatchId, tenant_id: TenantId);
}
