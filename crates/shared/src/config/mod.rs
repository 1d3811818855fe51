//! Configuration module for the Printfleet platform
//!
//! Centralized configuration loading, validation, and DTOs for every
//! component of the pipeline.
//!
//! # Architecture
//!
//! 1. **Single Source of Truth**: configuration is loaded once at startup
//! 2. **Fail Fast**: errors are reported immediately, no silent fallbacks
//! 3. **DTO Pattern**: configuration is immutable and passed via dependency
//!    injection
//! 4. **Env File Priority**: `.env` file > environment variables > error
//!
//! # Environment Variables
//!
//! ## Required
//!
//! - `PRINTFLEET_REALTIME_HTTP_ENDPOINT`: publish endpoint, e.g.
//!   `https://events.example.com`
//! - `PRINTFLEET_REALTIME_WS_ENDPOINT`: subscribe endpoint, e.g.
//!   `wss://events.example.com/event/realtime`
//! - `PRINTFLEET_SIGNING_KEY`: channel-signer secret
//!
//! ## Optional
//!
//! - `PRINTFLEET_QUEUE_BATCH_SIZE`: enqueue batch size (default 10, max 10)
//! - `PRINTFLEET_QUEUE_MAX_RECEIVE_COUNT`: redeliveries before the
//!   dead-letter buffer takes an item (default 3)
//! - `PRINTFLEET_QUEUE_VISIBILITY_TIMEOUT_SECS`: in-flight window (default 30)
//! - `PRINTFLEET_SIGNER_SCOPE`: credential scope label (default
//!   `printfleet/events`)
//! - `PRINTFLEET_AUTH_VALIDITY_SECS`: signed-material validity window
//!   (default 300)
//! - `PRINTFLEET_LOG_LEVEL`: log level when `RUST_LOG` is unset (default
//!   `info`)

pub mod dto;
pub mod error;
pub mod loader;
pub mod validator;

pub use dto::{AppConfig, LoggingConfig, QueueConfig, RealtimeConfig, SignerConfig};
pub use error::{ConfigError, Result};
pub use loader::ConfigLoader;
pub use validator::validate_app_config;
