//! Authorization source for the realtime transport
//!
//! Signed material is short-lived by design, so the transport asks for fresh
//! material on every connect and every subscribe. Implementations must not
//! cache across reconnects.

use async_trait::async_trait;
use printfleet_shared::auth::{AuthMaterial, AuthorizationError};
use printfleet_shared::channel::Channel;

#[async_trait]
pub trait RealtimeAuthProvider: Send + Sync {
    /// Material encoded into the connection handshake.
    async fn connection_auth(&self) -> Result<AuthMaterial, AuthorizationError>;

    /// Material attached to one `subscribe` frame.
    async fn channel_auth(&self, channel: &Channel) -> Result<AuthMaterial, AuthorizationError>;
}

/// Hands out a fixed copy of pre-signed material. Test and tooling helper;
/// production providers sign per call.
pub struct StaticAuthProvider {
    material: AuthMaterial,
}

impl StaticAuthProvider {
    pub fn new(material: AuthMaterial) -> Self {
        Self { material }
    }
}

#[async_trait]
impl RealtimeAuthProvider for StaticAuthProvider {
    async fn connection_auth(&self) -> Result<AuthMaterial, AuthorizationError> {
        Ok(self.material.clone())
    }

    async fn channel_auth(&self, _channel: &Channel) -> Result<AuthMaterial, AuthorizationError> {
        Ok(self.material.clone())
    }
}
