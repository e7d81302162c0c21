//! `tracing` subscriber setup.
//!
//! Logs go to stderr. `RUST_LOG`, when set, replaces `logging.level`.

use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| anyhow!("invalid logging.level '{}': {}", config.level, e)),
    }
}

/// Install the global subscriber. Fails if one is already set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter(config)?)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

/// Like [`init`], but a second call is a no-op. Useful from tests.
pub fn try_init(config: &LoggingConfig) {
    let _ = init(config);
}
