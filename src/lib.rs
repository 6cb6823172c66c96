//! Weather snapshot sync between a phone and a watch face.
//!
//! A producer builds today's forecast into a [`Snapshot`](types::Snapshot) and
//! pushes it once per sync cycle over a [`Transport`]. A consumer keeps a
//! listening connection, resolves the icon asset in the background, and commits
//! text and icon atomically to a [`RenderCache`]. The [`WatchFace`] redraws on
//! wall-clock second boundaries while visible and paints from the cache.
//!
//! # Features
//!
//! - **Owned sessions**: each side owns its connection; at most one in flight
//! - **Atomic render state**: paint never sees text from one push and icon from another
//! - **Degrades, never crashes**: icon failures keep the last icon and update text
//! - **In-process transport**: [`LocalHub`] links endpoints for tests and demos
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sunsync::{LocalHub, MemoryWeatherStore, Sunsync, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> sunsync::Result<()> {
//!     let config = SyncConfig::default();
//!     let hub = LocalHub::new();
//!
//!     let consumer = Sunsync::consumer(hub.endpoint("watch"), &config);
//!     let face = Sunsync::watch_face(consumer.cache().clone(), || {}, &config);
//!     consumer.start();
//!     face.on_visibility_changed(true);
//!
//!     let store = Arc::new(MemoryWeatherStore::new());
//!     let producer = Sunsync::producer(hub.endpoint("phone"), store, &config);
//!     if let Some(cycle) = producer.start_sync() {
//!         println!("{:?}", cycle.await);
//!     }
//!
//!     consumer.teardown().await;
//!     face.destroy();
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

pub mod config;
pub mod logging;

// Producer side
pub mod builder;
pub mod clock;
pub mod format;
pub mod icons;
pub mod store;

// Transport and sessions
pub mod session;
pub mod transport;
pub mod transports;

// Consumer side
pub mod cache;
pub mod receiver;
pub mod render;

use std::sync::Arc;

// Core exports
pub use error::*;
pub use types::*;

pub use builder::SnapshotBuilder;
pub use cache::RenderCache;
pub use clock::{Clock, SystemClock};
pub use config::{FaceConfig, LoggingConfig, SyncConfig, TransportConfig};
pub use icons::{GlyphIcons, IconSource};
pub use receiver::SnapshotReceiver;
pub use render::{Invalidate, Surface, WatchFace};
pub use session::{ConsumerSession, ProducerSession, SessionState, SyncOutcome};
pub use store::{MemoryWeatherStore, WeatherStore};
pub use transport::{AssetResolver, ConnectionEvent, DataListener, SuspendCause, Transport};
pub use transports::{LocalHub, LocalTransport};

/// Entry point wiring sessions and the face with the host's real clock.
///
/// Use the session constructors directly to inject a different clock or icon source.
pub struct Sunsync;

impl Sunsync {
    /// Producer session using [`GlyphIcons`] and the system clock.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use sunsync::{LocalHub, MemoryWeatherStore, Sunsync, SyncConfig};
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let hub = LocalHub::new();
    /// let store = Arc::new(MemoryWeatherStore::new());
    /// let producer = Sunsync::producer(hub.endpoint("phone"), store, &SyncConfig::default());
    /// producer.start_sync();
    /// # }
    /// ```
    pub fn producer<T: Transport>(
        transport: T,
        store: Arc<dyn WeatherStore>,
        config: &SyncConfig,
    ) -> ProducerSession<T> {
        let builder = SnapshotBuilder::new(
            store,
            Arc::new(GlyphIcons::default()),
            Arc::new(SystemClock),
            config.units,
        );
        ProducerSession::new(transport, builder, &config.transport)
    }

    /// Consumer session committing to a fresh [`RenderCache`]
    pub fn consumer<T: Transport>(transport: T, config: &SyncConfig) -> ConsumerSession<T> {
        ConsumerSession::new(transport, RenderCache::new(), &config.transport)
    }

    /// Watch face on the system clock. Must be called inside a tokio runtime.
    pub fn watch_face(
        cache: RenderCache,
        invalidate: impl Invalidate,
        config: &SyncConfig,
    ) -> WatchFace {
        WatchFace::new(cache, Arc::new(SystemClock), invalidate, &config.face)
    }
}
