//! Configuration DTOs
//!
//! Immutable configuration objects, built once from the environment and
//! passed to components by injection.

use super::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

/// Endpoints of the realtime event API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// HTTP publish endpoint (`https://...`).
    pub http_endpoint: String,
    /// WebSocket subscribe endpoint (`wss://...` or `ws://...`).
    pub ws_endpoint: String,
}

/// Work-queue tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Entries per enqueue batch. The substrate caps batches at 10.
    pub batch_size: usize,
    /// Delivery attempts before an item moves to the dead-letter buffer.
    /// Also the worker's retry-notice threshold.
    pub max_receive_count: u32,
    /// Seconds an in-flight delivery stays invisible to other consumers.
    pub visibility_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_receive_count: default_max_receive_count(),
            visibility_timeout_secs: default_visibility_timeout(),
        }
    }
}

/// Channel-signer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// HMAC signing secret.
    pub signing_key: String,
    /// Credential scope label embedded in the authorization header.
    pub credential_scope: String,
    /// Validity window of signed material, in seconds. Short on purpose.
    pub auth_validity_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub realtime: RealtimeConfig,
    pub queue: QueueConfig,
    pub signer: SignerConfig,
    pub logging: LoggingConfig,
}

const fn default_batch_size() -> usize {
    10
}

const fn default_max_receive_count() -> u32 {
    3
}

const fn default_visibility_timeout() -> u64 {
    30
}

const fn default_auth_validity() -> u64 {
    300
}

fn default_credential_scope() -> String {
    "printfleet/events".to_string()
}

impl AppConfig {
    /// Builds the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// Exists so tests can exercise the full parsing path without mutating
    /// process-global state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String> {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVariable { name })
        };

        let realtime = RealtimeConfig {
            http_endpoint: required("PRINTFLEET_REALTIME_HTTP_ENDPOINT")?,
            ws_endpoint: required("PRINTFLEET_REALTIME_WS_ENDPOINT")?,
        };

        let queue = QueueConfig {
            batch_size: parse_or(
                &lookup,
                "PRINTFLEET_QUEUE_BATCH_SIZE",
                default_batch_size(),
            )?,
            max_receive_count: parse_or(
                &lookup,
                "PRINTFLEET_QUEUE_MAX_RECEIVE_COUNT",
                default_max_receive_count(),
            )?,
            visibility_timeout_secs: parse_or(
                &lookup,
                "PRINTFLEET_QUEUE_VISIBILITY_TIMEOUT_SECS",
                default_visibility_timeout(),
            )?,
        };

        let signer = SignerConfig {
            signing_key: required("PRINTFLEET_SIGNING_KEY")?,
            credential_scope: lookup("PRINTFLEET_SIGNER_SCOPE")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_credential_scope),
            auth_validity_secs: parse_or(
                &lookup,
                "PRINTFLEET_AUTH_VALIDITY_SECS",
                default_auth_validity(),
            )?,
        };

        let logging = LoggingConfig {
            level: lookup("PRINTFLEET_LOG_LEVEL")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| LoggingConfig::default().level),
        };

        Ok(Self {
            realtime,
            queue,
            signer,
            logging,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) if value.is_empty() => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            name,
            value: value.clone(),
            reason: "not a number".to_string(),
        }),
    }
}
