//! Client-side realtime transport
//!
//! A single logical websocket connection per client process; all
//! subscriptions multiplex over it. The protocol envelope lives in
//! `printfleet_shared::realtime`; this module owns the connection state
//! machine and subscription routing.

pub mod auth;
pub mod transport;
