//! Application events carried over the realtime channels
//!
//! These are the payloads that travel inside the transport's `data` frames
//! and in publish requests. The union is closed and exhaustively matched:
//! adding a variant is a compile-time ripple through every consumer, which
//! replaces the runtime "unknown kind" assertions of duck-typed envelopes.

use crate::ids::DispatchId;
use serde::{Deserialize, Serialize};

/// Event published for each terminal or retry-notice outcome of a dispatch,
/// or broadcast to poke replicache clients into pulling.
///
/// Produced once per worker attempt; consumed zero-or-more times by any
/// number of subscribers. Consumers must tolerate duplicates and reordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// Outcome of one tenant-infrastructure provisioning attempt.
    InfraProvisionResult {
        #[serde(rename = "dispatchId")]
        dispatch_id: DispatchId,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retrying: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Outcome of one papercut data-synchronization attempt.
    PapercutSyncResult {
        #[serde(rename = "dispatchId")]
        dispatch_id: DispatchId,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retrying: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Hint that replicache clients should pull; carries no payload.
    ReplicachePoke,
}

impl Event {
    /// The dispatch this event correlates to, if any.
    pub fn dispatch_id(&self) -> Option<&DispatchId> {
        match self {
            Event::InfraProvisionResult { dispatch_id, .. }
            | Event::PapercutSyncResult { dispatch_id, .. } => Some(dispatch_id),
            Event::ReplicachePoke => None,
        }
    }

    /// True for a successful outcome event.
    pub fn is_success(&self) -> bool {
        match self {
            Event::InfraProvisionResult { success, .. }
            | Event::PapercutSyncResult { success, .. } => *success,
            Event::ReplicachePoke => false,
        }
    }

    /// True for a failure that will be re-attempted (non-terminal).
    pub fn is_retry_notice(&self) -> bool {
        match self {
            Event::InfraProvisionResult {
                success, retrying, ..
            }
            | Event::PapercutSyncResult {
                success, retrying, ..
            } => !*success && *retrying == Some(true),
            Event::ReplicachePoke => false,
        }
    }

    /// Decodes an event as delivered inside a transport `data` frame.
    ///
    /// Publishers carry each event as its own JSON string inside the outer
    /// array, so the transport may hand us either the event object itself or
    /// a string containing it. Both shapes are accepted.
    pub fn from_wire(value: &serde_json::Value) -> Result<Event, serde_json::Error> {
        match value {
            serde_json::Value::String(inner) => serde_json::from_str(inner),
            other => serde_json::from_value(other.clone()),
        }
    }

    /// True for a failure after which no further redelivery is expected.
    pub fn is_terminal_failure(&self) -> bool {
        match self {
            Event::InfraProvisionResult {
                success, retrying, ..
            }
            | Event::PapercutSyncResult {
                success, retrying, ..
            } => !*success && *retrying != Some(true),
            Event::ReplicachePoke => false,
        }
    }
}
