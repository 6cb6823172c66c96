//! Error types for snapshot sync and rendering.
//!
//! Every fallible operation in the crate reports a [`SyncError`]. Nothing in the
//! sync-and-render core lets an error escape an async callback: session tasks and the
//! receiver worker convert failures into a logged event plus a no-op or partial update.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: transport unreachable, connect timed out, not connected
//! - **Empty Data**: no weather record for today (skipped silently by the producer)
//! - **Asset Resolution Errors**: timeout, stale reference, oversized or undecodable icon
//! - **Malformed Messages**: a delivered item is missing a required field
//! - **Configuration Errors**: invalid or unreadable configuration
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use sunsync::SyncError;
//!
//! let error = SyncError::connection_failed("companion not paired");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Main error type for sync and render operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    #[error("Failed to connect to sync transport: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Transport is not connected: cannot {operation}")]
    NotConnected { operation: String },

    #[error("No weather record available for {day}")]
    EmptyData { day: String },

    #[error("Asset resolution failed: {reason}")]
    AssetResolution {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Malformed message at '{path}': {details}")]
    MalformedMessage { path: String, details: String },

    #[error("{operation} timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    #[error("Icon encoding error: {details}")]
    Icon {
        details: String,
        #[source]
        source: Option<image::ImageError>,
    },

    #[error("Weather store error: {details}")]
    Store { details: String },

    #[error("Configuration error in {origin}: {details}")]
    Config { origin: String, details: String },

    #[error("Configuration file error: {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Returns whether this error is potentially recoverable by invoking the operation again.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Connection { .. } => true,
            SyncError::NotConnected { .. } => true,
            SyncError::Timeout { .. } => true,
            SyncError::AssetResolution { .. } => true,
            SyncError::EmptyData { .. } => false,
            SyncError::MalformedMessage { .. } => false,
            SyncError::Icon { .. } => false,
            SyncError::Store { .. } => true,
            SyncError::Config { .. } => false,
            SyncError::ConfigFile { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SyncError::Connection { .. } => vec![
                "Check that the companion device is paired and in range",
                "Verify the transport service is available",
                "Invoke the sync again once connectivity returns",
            ],
            SyncError::NotConnected { .. } => vec![
                "Connect the session before pushing or resolving assets",
                "Wait for the consumer session to reach Listening",
            ],
            SyncError::Timeout { .. } => vec![
                "Increase the configured timeout",
                "Check link quality between the devices",
            ],
            SyncError::EmptyData { .. } => vec![
                "Refresh the forecast on the primary device",
                "Set a location in the companion app",
            ],
            SyncError::AssetResolution { .. } => vec![
                "Push a fresh snapshot so a new asset reference is issued",
                "Check that the icon stays below the configured size limit",
            ],
            SyncError::MalformedMessage { .. } => vec![
                "Ensure producer and consumer agree on wire field names",
                "Update both devices to the same release",
            ],
            SyncError::Icon { .. } => vec![
                "Verify the icon source produces valid RGBA pixel data",
                "Check the icon dimensions",
            ],
            SyncError::Store { .. } => vec![
                "Verify the weather store is readable",
                "Re-run the forecast sync on the primary device",
            ],
            SyncError::Config { .. } | SyncError::ConfigFile { .. } => vec![
                "Check the configuration file path and permissions",
                "Compare the file against the documented defaults",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        SyncError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SyncError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for operations attempted on a closed session.
    pub fn not_connected(operation: impl Into<String>) -> Self {
        SyncError::NotConnected { operation: operation.into() }
    }

    /// Helper constructor for asset resolution failures.
    pub fn asset_resolution(reason: impl Into<String>) -> Self {
        SyncError::AssetResolution { reason: reason.into(), source: None }
    }

    /// Helper constructor for malformed delivered items.
    pub fn malformed(path: impl Into<String>, details: impl Into<String>) -> Self {
        SyncError::MalformedMessage { path: path.into(), details: details.into() }
    }

    /// Helper constructor for timeouts.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        SyncError::Timeout { operation: operation.into(), duration }
    }

    /// Helper constructor for configuration errors.
    pub fn config(origin: impl Into<String>, details: impl Into<String>) -> Self {
        SyncError::Config { origin: origin.into(), details: details.into() }
    }
}

impl From<image::ImageError> for SyncError {
    fn from(err: image::ImageError) -> Self {
        SyncError::Icon { details: err.to_string(), source: Some(err) }
    }
}

impl From<serde_yaml_ng::Error> for SyncError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        SyncError::Config { origin: "yaml".to_string(), details: err.to_string() }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigFile { path: PathBuf::from("<unknown>"), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_carry_their_context(
                reason in ".*",
                path in "/[A-Z_]{1,20}",
                details in ".*",
                millis in 1u64..60_000u64
            ) {
                let connection = SyncError::connection_failed(reason.clone());
                prop_assert!(connection.to_string().contains(&reason));

                let malformed = SyncError::malformed(path.clone(), details.clone());
                let msg = malformed.to_string();
                prop_assert!(msg.contains(&path));
                prop_assert!(msg.contains(&details));

                let timeout = SyncError::timeout("asset resolution", Duration::from_millis(millis));
                prop_assert!(timeout.to_string().starts_with("asset resolution timed out"));
            }

            #[test]
            fn source_chain_is_preserved(base in "[a-z ]{1,40}") {
                let root: Box<dyn std::error::Error + Send + Sync> =
                    Box::new(std::io::Error::other(base.clone()));
                let err = SyncError::connection_failed_with_source("link down", root);

                let source = std::error::Error::source(&err);
                prop_assert!(source.is_some());
                prop_assert_eq!(source.map(|s| s.to_string()), Some(base));
            }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<SyncError>();

        let error = SyncError::connection_failed("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn retry_classification() {
        assert!(SyncError::connection_failed("x").is_retryable());
        assert!(SyncError::asset_resolution("stale").is_retryable());
        assert!(!SyncError::malformed("/WEATHER_DATA_PATH", "no HIGH").is_retryable());
        assert!(!SyncError::EmptyData { day: "2026-10-18".into() }.is_retryable());

        for err in [
            SyncError::connection_failed("x"),
            SyncError::not_connected("push"),
            SyncError::config("yaml", "bad"),
        ] {
            let suggestions = err.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn yaml_errors_become_config_errors() {
        let yaml_err = serde_yaml_ng::from_str::<u32>("not: [a number").unwrap_err();
        let err: SyncError = yaml_err.into();
        assert!(matches!(err, SyncError::Config { .. }));
    }
}
