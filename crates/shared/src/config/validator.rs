//! Configuration validation
//!
//! Fail-fast checks over the assembled [`AppConfig`]. Every rejected value
//! names the offending variable so operators can fix it without digging.

use super::dto::AppConfig;
use super::error::{ConfigError, Result};

/// The queue substrate rejects batches above this size.
pub const MAX_QUEUE_BATCH_SIZE: usize = 10;

pub fn validate_app_config(config: &AppConfig) -> Result<()> {
    validate_endpoint(
        "PRINTFLEET_REALTIME_HTTP_ENDPOINT",
        &config.realtime.http_endpoint,
        &["https://", "http://"],
    )?;
    validate_endpoint(
        "PRINTFLEET_REALTIME_WS_ENDPOINT",
        &config.realtime.ws_endpoint,
        &["wss://", "ws://"],
    )?;

    if config.queue.batch_size == 0 || config.queue.batch_size > MAX_QUEUE_BATCH_SIZE {
        return Err(ConfigError::InvalidValue {
            name: "PRINTFLEET_QUEUE_BATCH_SIZE",
            value: config.queue.batch_size.to_string(),
            reason: format!("must be 1..={}", MAX_QUEUE_BATCH_SIZE),
        });
    }

    if config.queue.max_receive_count == 0 {
        return Err(ConfigError::InvalidValue {
            name: "PRINTFLEET_QUEUE_MAX_RECEIVE_COUNT",
            value: "0".to_string(),
            reason: "at least one delivery attempt is required".to_string(),
        });
    }

    if config.signer.signing_key.len() < 16 {
        return Err(ConfigError::InvalidValue {
            name: "PRINTFLEET_SIGNING_KEY",
            value: "<redacted>".to_string(),
            reason: "key must be at least 16 bytes".to_string(),
        });
    }

    if config.signer.auth_validity_secs == 0 || config.signer.auth_validity_secs > 3600 {
        return Err(ConfigError::InvalidValue {
            name: "PRINTFLEET_AUTH_VALIDITY_SECS",
            value: config.signer.auth_validity_secs.to_string(),
            reason: "validity window must be 1..=3600 seconds".to_string(),
        });
    }

    Ok(())
}

fn validate_endpoint(name: &'static str, value: &str, schemes: &[&str]) -> Result<()> {
    if schemes.iter().any(|scheme| value.starts_with(scheme)) {
        return Ok(());
    }
    Err(ConfigError::InvalidValue {
        name,
        value: value.to_string(),
        reason: format!("expected one of: {}", schemes.join(", ")),
    })
}
