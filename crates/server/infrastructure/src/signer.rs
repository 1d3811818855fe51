//! HMAC channel signer
//!
//! Produces SigV4-shaped authorization headers scoped to one channel and one
//! direction, valid for a bounded window. The capability check runs before
//! any signing and fails closed: cross-tenant requests are rejected outright.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use printfleet_server_domain::signer::{ChannelSigner, DispatchRegistry};
use printfleet_shared::auth::{AuthMaterial, AuthorizationError, Principal, SignDirection};
use printfleet_shared::channel::{Channel, ChannelKind};
use printfleet_shared::config::{RealtimeConfig, SignerConfig};
use printfleet_shared::ids::DispatchId;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// In-memory dispatch→tenant ownership oracle.
#[derive(Default)]
pub struct InMemoryDispatchRegistry {
    entries: dashmap::DashMap<DispatchId, printfleet_shared::ids::TenantId>,
}

impl InMemoryDispatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DispatchRegistry for InMemoryDispatchRegistry {
    fn tenant_of(&self, dispatch_id: &DispatchId) -> Option<printfleet_shared::ids::TenantId> {
        self.entries.get(dispatch_id).map(|entry| entry.clone())
    }

    fn record(&self, dispatch_id: DispatchId, tenant_id: printfleet_shared::ids::TenantId) {
        self.entries.insert(dispatch_id, tenant_id);
    }
}

pub struct HmacChannelSigner {
    config: SignerConfig,
    host: String,
    registry: Arc<dyn DispatchRegistry>,
}

impl HmacChannelSigner {
    pub fn new(
        config: SignerConfig,
        realtime: &RealtimeConfig,
        registry: Arc<dyn DispatchRegistry>,
    ) -> Self {
        Self {
            config,
            host: host_of(&realtime.http_endpoint),
            registry,
        }
    }

    fn authorize(
        &self,
        direction: SignDirection,
        channel: &Channel,
        principal: &Principal,
    ) -> Result<(), AuthorizationError> {
        let forbidden = || AuthorizationError::Forbidden {
            principal: principal.label(),
            direction,
            channel: channel.as_str().to_string(),
        };

        match principal {
            Principal::System => Ok(()),

            Principal::Tenant(tenant_id) => match channel.kind() {
                ChannelKind::Events(dispatch_id) => {
                    match self.registry.tenant_of(&dispatch_id) {
                        Some(owner) if owner == *tenant_id => Ok(()),
                        Some(_) => Err(forbidden()),
                        None => Err(AuthorizationError::UnknownDispatch {
                            dispatch_id: dispatch_id.to_string(),
                        }),
                    }
                }
                ChannelKind::ReplicacheTenant | ChannelKind::ReplicacheUser(_) => Ok(()),
                ChannelKind::Other => Err(forbidden()),
            },

            Principal::User { user_id, tenant_id } => {
                if direction != SignDirection::Subscribe {
                    return Err(forbidden());
                }
                match channel.kind() {
                    ChannelKind::Events(dispatch_id) => {
                        match self.registry.tenant_of(&dispatch_id) {
                            Some(owner) if owner == *tenant_id => Ok(()),
                            Some(_) => Err(forbidden()),
                            None => Err(AuthorizationError::UnknownDispatch {
                                dispatch_id: dispatch_id.to_string(),
                            }),
                        }
                    }
                    ChannelKind::ReplicacheUser(owner) if owner == *user_id => Ok(()),
                    ChannelKind::ReplicacheUser(_) => Err(forbidden()),
                    ChannelKind::ReplicacheTenant => Ok(()),
                    ChannelKind::Other => Err(forbidden()),
                }
            }
        }
    }
}

#[async_trait]
impl ChannelSigner for HmacChannelSigner {
    async fn sign(
        &self,
        direction: SignDirection,
        channel: &Channel,
        principal: &Principal,
    ) -> Result<AuthMaterial, AuthorizationError> {
        self.authorize(direction, channel, principal)?;

        let now = Utc::now();
        let date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let canonical = format!(
            "{}\n{}\n{}\n{}\n{}",
            direction,
            channel,
            self.host,
            date,
            principal.label()
        );

        let mut mac = HmacSha256::new_from_slice(self.config.signing_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(canonical.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}/{}, SignedHeaders=host;x-amz-date, Signature={}",
            principal.label(),
            &date[..8],
            self.config.credential_scope,
            signature
        );

        debug!(
            channel = %channel,
            direction = %direction,
            principal = %principal.label(),
            "Signed channel access"
        );

        Ok(AuthMaterial {
            headers: BTreeMap::from([
                ("host".to_string(), self.host.clone()),
                ("x-amz-date".to_string(), date),
                ("authorization".to_string(), authorization),
            ]),
            expires_at: now + Duration::seconds(self.config.auth_validity_secs as i64),
        })
    }
}

fn host_of(endpoint: &str) -> String {
    let without_scheme = endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint);
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_string()
}
