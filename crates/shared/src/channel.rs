//! Centralized channel addressing for the realtime event API
//!
//! This module provides a single source of truth for all pub/sub channel
//! names, preventing mismatches between publishers and subscribers.
//!
//! ## Naming Convention
//! - Dispatch outcomes: `/events/{dispatchId}`
//! - Replicache pokes, per user: `/replicache/users/{userId}`
//! - Replicache pokes, tenant-wide: `/replicache/tenant`
//!
//! A channel name is a pure function of the subject identifier; the system
//! attaches no other state to a channel. Subscription bookkeeping belongs to
//! the transport.

use crate::error::SharedError;
use crate::ids::{DispatchId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace prefix for dispatch-outcome channels
pub const EVENTS_PREFIX: &str = "/events/";

/// Namespace prefix for per-user replicache channels
pub const REPLICACHE_USERS_PREFIX: &str = "/replicache/users/";

/// Tenant-wide replicache channel
pub const REPLICACHE_TENANT: &str = "/replicache/tenant";

/// A named pub/sub channel path.
///
/// Invariant: always starts with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

/// Parsed view of a channel path, by namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKind {
    Events(DispatchId),
    ReplicacheUser(UserId),
    ReplicacheTenant,
    /// Unknown namespaces are opaque, not an error.
    Other,
}

impl Channel {
    /// Channel carrying the outcome events of one dispatch.
    pub fn events(dispatch_id: &DispatchId) -> Self {
        Self(format!("{}{}", EVENTS_PREFIX, dispatch_id))
    }

    /// Per-user replicache poke channel.
    pub fn replicache_user(user_id: &UserId) -> Self {
        Self(format!("{}{}", REPLICACHE_USERS_PREFIX, user_id))
    }

    /// Tenant-wide replicache poke channel.
    pub fn replicache_tenant() -> Self {
        Self(REPLICACHE_TENANT.to_string())
    }

    /// Parses an arbitrary channel path string.
    ///
    /// Rejects paths that do not start with `/`.
    pub fn parse(path: &str) -> Result<Self, SharedError> {
        if !path.starts_with('/') {
            return Err(SharedError::InvalidChannel {
                channel: path.to_string(),
            });
        }
        Ok(Self(path.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classifies the channel by its namespace prefix.
    pub fn kind(&self) -> ChannelKind {
        if let Some(rest) = self.0.strip_prefix(EVENTS_PREFIX) {
            return match DispatchId::from_string(rest) {
                Some(id) => ChannelKind::Events(id),
                None => ChannelKind::Other,
            };
        }
        if let Some(rest) = self.0.strip_prefix(REPLICACHE_USERS_PREFIX) {
            return match UserId::from_string(rest) {
                Some(id) => ChannelKind::ReplicacheUser(id),
                None => ChannelKind::Other,
            };
        }
        if self.0 == REPLICACHE_TENANT {
            return ChannelKind::ReplicacheTenant;
        }
        ChannelKind::Other
    }

    /// The dispatch this channel addresses, if it is an `/events/` channel.
    pub fn dispatch_id(&self) -> Option<DispatchId> {
        match self.kind() {
            ChannelKind::Events(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
