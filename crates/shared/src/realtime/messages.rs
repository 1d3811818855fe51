//! Realtime message envelope
//!
//! Both directions use JSON objects discriminated by a `type` field. The
//! receiver is liberal: frames that fail to parse are reported to the caller
//! as a parse error and skipped, never fatal (except the connection-ack
//! timeout, which is transport policy, not a message concern).

use crate::auth::AuthMaterial;
use crate::channel::Channel;
use crate::ids::SubscriptionId;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Base subprotocol of the event websocket.
pub const HANDSHAKE_BASE_PROTOCOL: &str = "aws-appsync-event-ws";

/// Error detail carried by `*_error` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolErrorDetail {
    #[serde(rename = "errorType")]
    pub error_type: String,
    pub message: String,
}

/// Frames sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First frame after the socket opens; requests a `connection_ack`.
    ConnectionInit,

    /// Opens a subscription on `channel`, authorized by freshly signed
    /// headers. Fire-and-forget: the reply (if any) arrives asynchronously
    /// as `subscribe_success` or `subscribe_error` carrying the same `id`.
    Subscribe {
        id: SubscriptionId,
        channel: Channel,
        authorization: BTreeMap<String, String>,
    },

    /// Closes a subscription. Safe to send before the subscribe was acked.
    Unsubscribe { id: SubscriptionId },
}

/// Frames sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledges `connection_init` and arms the inactivity timeout.
    ConnectionAck {
        #[serde(rename = "connectionTimeoutMs")]
        connection_timeout_ms: u64,
    },

    /// Keep-alive: clears the pending inactivity deadline.
    Ka,

    /// An event delivered to the subscription registered under `id`.
    Data {
        id: SubscriptionId,
        event: serde_json::Value,
    },

    SubscribeSuccess {
        id: SubscriptionId,
    },

    SubscribeError {
        id: SubscriptionId,
        errors: Vec<ProtocolErrorDetail>,
    },

    UnsubscribeSuccess {
        id: SubscriptionId,
    },

    UnsubscribeError {
        id: SubscriptionId,
        errors: Vec<ProtocolErrorDetail>,
    },

    BroadcastError {
        id: SubscriptionId,
        errors: Vec<ProtocolErrorDetail>,
    },
}

/// Builds the websocket handshake subprotocol list.
///
/// Browser-grade websocket primitives cannot attach custom headers, so the
/// connection authorization travels as a base64url token inside the
/// subprotocol list instead: `["aws-appsync-event-ws", "header-<token>"]`.
pub fn handshake_subprotocols(auth: &AuthMaterial) -> Result<[String; 2], serde_json::Error> {
    let json = serde_json::to_string(&auth.headers)?;
    let token = URL_SAFE_NO_PAD.encode(json.as_bytes());
    Ok([
        HANDSHAKE_BASE_PROTOCOL.to_string(),
        format!("header-{}", token),
    ])
}
