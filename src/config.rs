//! Runtime configuration loaded from YAML
//!
//! Every field has a default, so an empty document is a valid config:
//!
//! ```yaml
//! transport:
//!   connect_timeout_ms: 10000
//!   asset_timeout_ms: 5000
//!   handshake_path: /messagePath
//!   dispatch_capacity: 16
//!   max_icon_bytes: 65536
//!   max_icon_dimension: 512
//! face:
//!   active_interval_ms: 1000
//!   no_data_label: Set Location in app
//! units: imperial
//! logging:
//!   level: info
//!   format: compact
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::types::TemperatureUnit;
use crate::{Result, SyncError};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub transport: TransportConfig,
    pub face: FaceConfig,
    pub units: TemperatureUnit,
    pub logging: LoggingConfig,
}

/// Connection, dispatch and asset limits shared by both session managers
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    pub connect_timeout_ms: u64,
    pub asset_timeout_ms: u64,
    /// One-shot liveness message sent by the consumer after connecting; `null` disables it
    pub handshake_path: Option<String>,
    /// Receiver queue depth, rounded up to a power of two; on overflow the oldest update is overwritten
    pub dispatch_capacity: usize,
    pub max_icon_bytes: usize,
    /// Largest accepted icon width or height after decoding
    pub max_icon_dimension: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            asset_timeout_ms: 5_000,
            handshake_path: Some("/messagePath".to_string()),
            dispatch_capacity: 16,
            max_icon_bytes: 64 * 1024,
            max_icon_dimension: 512,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn asset_timeout(&self) -> Duration {
        Duration::from_millis(self.asset_timeout_ms)
    }
}

/// Watch face rendering settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FaceConfig {
    /// Redraw period while visible and interactive
    pub active_interval_ms: u64,
    /// Prompt painted before any weather has arrived
    pub no_data_label: String,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self { active_interval_ms: 1_000, no_data_label: "Set Location in app".to_string() }
    }
}

impl FaceConfig {
    pub fn active_interval(&self) -> Duration {
        Duration::from_millis(self.active_interval_ms)
    }
}

/// Log output style
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Fallback filter used when `RUST_LOG` is unset
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl SyncConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // An empty file deserializes as unit, not as an empty mapping
        let config: SyncConfig =
            if yaml.trim().is_empty() { SyncConfig::default() } else { serde_yaml_ng::from_str(yaml)? };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|source| SyncError::ConfigFile { path: path.to_path_buf(), source })?;
        Self::from_yaml_str(&yaml).map_err(|e| match e {
            SyncError::Config { details, .. } => {
                SyncError::config(path.display().to_string(), details)
            }
            other => other,
        })
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        let t = &self.transport;
        let checks = [
            (t.connect_timeout_ms == 0, "transport.connect_timeout_ms must be positive"),
            (t.asset_timeout_ms == 0, "transport.asset_timeout_ms must be positive"),
            (t.dispatch_capacity == 0, "transport.dispatch_capacity must be positive"),
            (t.max_icon_bytes == 0, "transport.max_icon_bytes must be positive"),
            (t.max_icon_dimension == 0, "transport.max_icon_dimension must be positive"),
            (self.face.active_interval_ms == 0, "face.active_interval_ms must be positive"),
            (
                t.handshake_path.as_deref().is_some_and(|p| !p.starts_with('/')),
                "transport.handshake_path must start with '/'",
            ),
        ];
        match checks.into_iter().find(|(failed, _)| *failed) {
            Some((_, details)) => Err(SyncError::config("validation", details)),
            None => Ok(()),
        }
    }
}
