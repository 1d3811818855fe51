//! Authorization material for channel access
//!
//! Signed material is scoped to exactly one channel pattern and one
//! direction, with a bounded validity window. It is not a bearer token for
//! general API access, and it is never cached across connects or subscribes.

use crate::ids::{TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Direction a signature authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignDirection {
    Publish,
    Subscribe,
}

impl std::fmt::Display for SignDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignDirection::Publish => write!(f, "publish"),
            SignDirection::Subscribe => write!(f, "subscribe"),
        }
    }
}

/// The identity requesting a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Backend services; may sign any channel in both directions.
    System,
    /// A tenant-scoped service (e.g. a worker acting for one tenant).
    Tenant(TenantId),
    /// An end user session.
    User { user_id: UserId, tenant_id: TenantId },
}

impl Principal {
    pub fn tenant_id(&self) -> Option<&TenantId> {
        match self {
            Principal::System => None,
            Principal::Tenant(tenant_id) => Some(tenant_id),
            Principal::User { tenant_id, .. } => Some(tenant_id),
        }
    }

    /// Short label used in the credential string, never for access decisions.
    pub fn label(&self) -> String {
        match self {
            Principal::System => "system".to_string(),
            Principal::Tenant(tenant_id) => format!("tenant-{}", tenant_id),
            Principal::User { user_id, .. } => format!("user-{}", user_id),
        }
    }
}

/// Short-lived signed headers granting access to one channel, one direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthMaterial {
    /// Header map attached to the publish request or subscribe frame.
    /// Ordered so the serialized form is deterministic.
    pub headers: BTreeMap<String, String>,
    /// Instant after which the material must not be presented.
    pub expires_at: DateTime<Utc>,
}

impl AuthMaterial {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Raised when a principal lacks the capability behind a signing request.
/// Fails closed: there are no partial grants.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum AuthorizationError {
    #[error("{principal} may not {direction} on {channel}")]
    Forbidden {
        principal: String,
        direction: SignDirection,
        channel: String,
    },

    #[error("Unknown dispatch: {dispatch_id}")]
    UnknownDispatch { dispatch_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry_window() {
        let now = Utc::now();
        let material = AuthMaterial {
            headers: BTreeMap::new(),
            expires_at: now + Duration::seconds(300),
        };
        assert!(!material.is_expired(now));
        assert!(material.is_expired(now + Duration::seconds(300)));
        assert!(material.is_expired(now + Duration::seconds(301)));
    }

    #[test]
    fn test_principal_tenant_scope() {
        let tenant_id = TenantId::new();
        assert_eq!(Principal::System.tenant_id(), None);
        assert_eq!(
            Principal::Tenant(tenant_id.clone()).tenant_id(),
            Some(&tenant_id)
        );
    }
}
