//! Transport trait for the sync substrate

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::Result;
use crate::types::{Asset, AssetRef, DataEvent, PushMessage};

/// Receives batches of delivered items.
///
/// Called from whatever context the transport delivers on. Implementations must
/// return promptly: hand work off, never block or await inside.
pub trait DataListener: Send + Sync {
    fn on_data_changed(&self, events: Vec<DataEvent>);
}

impl<F> DataListener for F
where
    F: Fn(Vec<DataEvent>) + Send + Sync,
{
    fn on_data_changed(&self, events: Vec<DataEvent>) {
        (self)(events)
    }
}

/// Handle returned by [`Transport::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Why a live connection was suspended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendCause {
    ServiceDisconnected,
    NetworkLost,
    Other(i32),
}

impl SuspendCause {
    /// Numeric cause code as reported by the transport service
    pub fn code(self) -> i32 {
        match self {
            SuspendCause::ServiceDisconnected => 1,
            SuspendCause::NetworkLost => 2,
            SuspendCause::Other(code) => code,
        }
    }
}

/// Connection notifications published by a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Suspended(SuspendCause),
    Disconnected,
}

/// Resolve-only view of a transport.
///
/// This is the only capability the snapshot receiver gets: it can turn references
/// into bytes over the live connection but cannot connect, disconnect, or push.
#[async_trait::async_trait]
pub trait AssetResolver: Send + Sync + 'static {
    /// Resolve a reference into raw bytes, giving up after `timeout`.
    ///
    /// Fails with `AssetResolution` for unknown or stale references and
    /// `Timeout` when the deadline passes.
    async fn resolve_asset(&self, asset: &AssetRef, timeout: Duration) -> Result<Arc<[u8]>>;
}

/// Reference-counted pub/sub channel between two devices.
///
/// A transport value represents one endpoint. It is owned by exactly one session
/// manager; other components only ever see it as an [`AssetResolver`].
#[async_trait::async_trait]
pub trait Transport: AssetResolver {
    /// Establish the connection.
    ///
    /// Returns `Ok(())` once connected or a `Connection` error with the reason.
    async fn connect(&self) -> Result<()>;

    /// Close the connection. Idempotent.
    async fn disconnect(&self);

    /// Whether the endpoint is currently connected
    fn is_connected(&self) -> bool;

    /// Put an item; best-effort, at-most-once delivery to connected peers.
    async fn push(&self, message: PushMessage<Asset>) -> Result<()>;

    /// Send a one-shot message to connected peers (not persisted, not delivered to
    /// data listeners).
    async fn send_message(&self, path: &str, payload: &[u8]) -> Result<()>;

    /// Register a listener for delivered items
    fn add_listener(&self, listener: Arc<dyn DataListener>) -> ListenerId;

    /// Remove a listener; returns whether it was registered
    fn remove_listener(&self, id: ListenerId) -> bool;

    /// Subscribe to connection notifications
    fn connection_events(&self) -> broadcast::Receiver<ConnectionEvent>;
}
