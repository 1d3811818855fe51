//! Event-publisher port
//!
//! Delivers events to a channel in one authenticated request. No internal
//! retry: retry policy belongs to the caller, which must also decide whether
//! a failed courtesy publish fails the surrounding work item.

use async_trait::async_trait;
use printfleet_shared::auth::AuthorizationError;
use printfleet_shared::channel::Channel;
use printfleet_shared::events::Event;
use thiserror::Error;

/// The transport accepts at most this many events per publish request.
pub const MAX_EVENTS_PER_PUBLISH: usize = 5;

/// Serialized request-body ceiling. Exceeding it is a caller bug: the caller
/// must split, the publisher never does.
pub const MAX_PUBLISH_BYTES: usize = 240 * 1024;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Cannot publish an empty batch")]
    EmptyBatch,

    #[error("Too many events in one publish: {count} (max {MAX_EVENTS_PER_PUBLISH})")]
    TooManyEvents { count: usize },

    #[error("Publish payload too large: {bytes} bytes (max {MAX_PUBLISH_BYTES})")]
    PayloadTooLarge { bytes: usize },

    #[error("Failed to serialize events: {0}")]
    Serialization(String),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error("Publish rejected: HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Publish transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes `events` to `channel` in one outbound request.
    ///
    /// Preconditions: `events` is non-empty, within [`MAX_EVENTS_PER_PUBLISH`]
    /// and [`MAX_PUBLISH_BYTES`].
    async fn publish(&self, channel: &Channel, events: &[Event]) -> Result<(), PublishError>;
}
