//! Realtime transport wire protocol
//!
//! Shared message envelope for the event-websocket protocol, used by the
//! client transport and by test servers standing in for the real one.

pub mod messages;

pub use messages::{
    ClientMessage, HANDSHAKE_BASE_PROTOCOL, ProtocolErrorDetail, ServerMessage,
    handshake_subprotocols,
};
