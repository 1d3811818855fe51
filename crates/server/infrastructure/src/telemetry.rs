//! Telemetry bootstrap
//!
//! Builds the global tracing subscriber. `RUST_LOG` wins over the configured
//! default; calling twice is harmless.

use printfleet_shared::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

pub fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
