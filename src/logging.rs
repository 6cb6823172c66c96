//! Tracing subscriber setup for hosts embedding the sync core

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};
use crate::{Result, SyncError};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config.level` is used as the filter
/// directive. Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;

    let layer = match config.format {
        LogFormat::Compact => fmt::layer().compact().with_target(true).with_filter(filter).boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| SyncError::config("logging", e.to_string()))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| SyncError::config("logging.level", e.to_string())),
    }
}
