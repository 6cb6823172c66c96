//! Snapshot receiver: delivered items to render-cache commits
//!
//! The transport calls [`SnapshotReceiver`] on its own delivery context. The
//! receiver only parses and enqueues; a single [`ReceiverWorker`] task drains the
//! queue in delivery order, resolves icon assets with a deadline, and commits
//! each result to the [`RenderCache`] in one step.
//!
//! Every item is a full snapshot, so when the worker falls behind the queue
//! overwrites its oldest entries and the newest update always survives.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::cache::RenderCache;
use crate::transport::{AssetResolver, DataListener};
use crate::types::{
    AssetRef, DataEvent, DataEventKind, Icon, RenderState, WEATHER_DATA_HIGH, WEATHER_DATA_ICON,
    WEATHER_DATA_LOW, WEATHER_DATA_PATH, WEATHER_DATA_TIME, compose_display_text,
};
use crate::{Result, SyncError, TransportConfig};

/// A parsed snapshot waiting for its icon to be resolved
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    pub display_text: String,
    pub icon: Option<AssetRef>,
    pub sent_at_millis: Option<i64>,
}

/// Extract a snapshot from one delivered event.
///
/// Returns:
/// - `Ok(Some(update))` - a weather item with both temperatures
/// - `Ok(None)` - another path, or a deletion
/// - `Err(MalformedMessage)` - a weather item missing HIGH or LOW
pub fn parse_event(event: &DataEvent) -> Result<Option<PendingUpdate>> {
    if event.path() != WEATHER_DATA_PATH || event.kind != DataEventKind::Changed {
        return Ok(None);
    }
    let item = &event.item;

    let field = |key: &str| {
        item.text(key).ok_or_else(|| {
            let details = match item.field_kind(key) {
                Some(kind) => format!("{} is {}, expected text", key, kind),
                None => format!("{} is missing", key),
            };
            SyncError::malformed(item.path(), details)
        })
    };
    let high = field(WEATHER_DATA_HIGH)?;
    let low = field(WEATHER_DATA_LOW)?;

    let icon = match item.get(WEATHER_DATA_ICON) {
        Some(value) => match value.as_asset() {
            Some(asset) => Some(*asset),
            None => {
                warn!(kind = ?item.field_kind(WEATHER_DATA_ICON), "Icon field is not an asset, treating as missing");
                None
            }
        },
        None => None,
    };

    Ok(Some(PendingUpdate {
        display_text: compose_display_text(high, low),
        icon,
        sent_at_millis: item.long(WEATHER_DATA_TIME),
    }))
}

/// Listener registered on the consumer's transport.
///
/// Never blocks: updates go into a bounded ring. When it is full the oldest
/// queued update is overwritten.
pub struct SnapshotReceiver {
    queue: broadcast::Sender<PendingUpdate>,
    dropped: Arc<AtomicUsize>,
    malformed: AtomicUsize,
}

/// Consuming end of a [`SnapshotReceiver`], drained by [`ReceiverWorker`]
pub struct UpdateQueue {
    rx: broadcast::Receiver<PendingUpdate>,
    dropped: Arc<AtomicUsize>,
}

impl UpdateQueue {
    /// Next update in delivery order, or `None` once the receiver is gone.
    ///
    /// Updates overwritten while the worker was busy are counted and skipped.
    pub async fn recv(&mut self) -> Option<PendingUpdate> {
        loop {
            match self.rx.recv().await {
                Ok(update) => return Some(update),
                Err(RecvError::Lagged(skipped)) => {
                    self.dropped.fetch_add(skipped as usize, Ordering::Relaxed);
                    warn!(skipped, "Receiver queue overflowed, skipping superseded updates");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl SnapshotReceiver {
    /// Create a receiver and the queue its worker drains
    pub fn new(capacity: usize) -> (Self, UpdateQueue) {
        let (queue, rx) = broadcast::channel(capacity.max(1));
        let dropped = Arc::new(AtomicUsize::new(0));
        let receiver = Self { queue, dropped: Arc::clone(&dropped), malformed: AtomicUsize::new(0) };
        (receiver, UpdateQueue { rx, dropped })
    }

    /// Updates superseded in a full queue, or delivered after the worker exited
    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Messages dropped for missing fields
    pub fn malformed_count(&self) -> usize {
        self.malformed.load(Ordering::Relaxed)
    }
}

impl DataListener for SnapshotReceiver {
    fn on_data_changed(&self, events: Vec<DataEvent>) {
        trace!(count = events.len(), "Data changed");
        for event in events {
            let update = match parse_event(&event) {
                Ok(Some(update)) => update,
                Ok(None) => {
                    trace!(path = event.path(), kind = ?event.kind, "Ignoring event");
                    continue;
                }
                Err(e) => {
                    self.malformed.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Dropping malformed weather item");
                    continue;
                }
            };

            if let Err(broadcast::error::SendError(update)) = self.queue.send(update) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(text = %update.display_text, "Receiver worker gone, dropping update");
            }
        }
    }
}

/// Limits applied when resolving an icon asset
#[derive(Debug, Clone, Copy)]
pub struct ResolveSettings {
    pub timeout: Duration,
    pub max_icon_bytes: usize,
    pub max_icon_dimension: u32,
}

impl From<&TransportConfig> for ResolveSettings {
    fn from(config: &TransportConfig) -> Self {
        Self {
            timeout: config.asset_timeout(),
            max_icon_bytes: config.max_icon_bytes,
            max_icon_dimension: config.max_icon_dimension,
        }
    }
}

/// What a processed update committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    /// Text and freshly decoded icon
    Full,
    /// Text only; the previous icon was kept
    TextOnly,
}

/// Background task draining the receiver queue
pub struct ReceiverWorker;

impl ReceiverWorker {
    /// Spawn the worker.
    ///
    /// Cancellation is observed between updates only, so an in-flight resolution
    /// always finishes (or hits its deadline) and commits before the task exits.
    pub fn spawn(
        mut queue: UpdateQueue,
        resolver: Arc<dyn AssetResolver>,
        cache: RenderCache,
        settings: ResolveSettings,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!("Receiver worker started");
            let mut processed = 0u64;
            loop {
                let update = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Receiver worker cancelled");
                        break;
                    }
                    next = queue.recv() => match next {
                        Some(update) => update,
                        None => break,
                    },
                };
                apply_update(update, resolver.as_ref(), &cache, &settings).await;
                processed += 1;
            }
            debug!(processed, "Receiver worker ended");
        })
    }
}

/// Resolve the update's icon (if any) and commit it.
pub async fn apply_update(
    update: PendingUpdate,
    resolver: &dyn AssetResolver,
    cache: &RenderCache,
    settings: &ResolveSettings,
) -> CommitKind {
    let PendingUpdate { display_text, icon, sent_at_millis } = update;

    let Some(asset) = icon else {
        debug!(text = %display_text, "Snapshot without icon, committing text only");
        cache.commit_text(display_text, sent_at_millis);
        return CommitKind::TextOnly;
    };

    match resolve_icon(resolver, &asset, settings).await {
        Ok(icon) => {
            info!(
                text = %display_text,
                width = icon.width(),
                height = icon.height(),
                sent_at_millis,
                "Weather snapshot committed"
            );
            cache.commit(RenderState::new(display_text, Some(icon)).with_sent_at(sent_at_millis));
            CommitKind::Full
        }
        Err(e) => {
            warn!(error = %e, text = %display_text, "Icon unavailable, keeping previous icon");
            cache.commit_text(display_text, sent_at_millis);
            CommitKind::TextOnly
        }
    }
}

async fn resolve_icon(
    resolver: &dyn AssetResolver,
    asset: &AssetRef,
    settings: &ResolveSettings,
) -> Result<Icon> {
    let bytes = resolver.resolve_asset(asset, settings.timeout).await?;
    if bytes.len() > settings.max_icon_bytes {
        return Err(SyncError::asset_resolution(format!(
            "icon is {} bytes, limit is {}",
            bytes.len(),
            settings.max_icon_bytes
        )));
    }

    // Decoding is CPU-bound; keep it off the async workers
    let max_dimension = settings.max_icon_dimension;
    tokio::task::spawn_blocking(move || Icon::decode_png_limited(&bytes, max_dimension))
        .await
        .map_err(|e| SyncError::asset_resolution(format!("icon decode task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MapResolver, fixture_icon_png};
    use crate::types::{PushMessage, RenderState};

    fn settings() -> ResolveSettings {
        ResolveSettings {
            timeout: Duration::from_secs(5),
            max_icon_bytes: 64 * 1024,
            max_icon_dimension: 512,
        }
    }

    fn weather_event(high: &str, low: &str, icon: Option<AssetRef>) -> DataEvent {
        let mut item = PushMessage::new(WEATHER_DATA_PATH)
            .put_text(WEATHER_DATA_HIGH, high)
            .put_text(WEATHER_DATA_LOW, low)
            .put_long(WEATHER_DATA_TIME, 1_000);
        if let Some(icon) = icon {
            item = item.put_asset(WEATHER_DATA_ICON, icon);
        }
        DataEvent::changed(item)
    }

    #[test]
    fn parse_ignores_other_paths_and_deletions() {
        let other = DataEvent::changed(PushMessage::new("/messagePath"));
        assert_eq!(parse_event(&other).unwrap(), None);

        let deleted = DataEvent::deleted(PushMessage::new(WEATHER_DATA_PATH));
        assert_eq!(parse_event(&deleted).unwrap(), None);
    }

    #[test]
    fn parse_composes_display_text() {
        let update = parse_event(&weather_event("75°", "60°", Some(AssetRef::new(3, 1))))
            .unwrap()
            .unwrap();
        assert_eq!(update.display_text, "75°/60°");
        assert_eq!(update.icon, Some(AssetRef::new(3, 1)));
        assert_eq!(update.sent_at_millis, Some(1_000));
    }

    #[test]
    fn parse_rejects_missing_low() {
        let item = PushMessage::new(WEATHER_DATA_PATH).put_text(WEATHER_DATA_HIGH, "75°");
        let err = parse_event(&DataEvent::changed(item)).unwrap_err();
        assert!(err.to_string().contains("WEATHER_DATA_LOW is missing"));
    }

    #[test]
    fn parse_treats_non_asset_icon_as_missing() {
        let item = PushMessage::new(WEATHER_DATA_PATH)
            .put_text(WEATHER_DATA_HIGH, "75°")
            .put_text(WEATHER_DATA_LOW, "60°")
            .put_text(WEATHER_DATA_ICON, "sunny.png");
        let update = parse_event(&DataEvent::changed(item)).unwrap().unwrap();
        assert_eq!(update.icon, None);
    }

    #[tokio::test]
    async fn malformed_item_does_not_stop_the_batch() {
        let (receiver, mut queue) = SnapshotReceiver::new(4);
        let broken = DataEvent::changed(PushMessage::new(WEATHER_DATA_PATH).put_long(WEATHER_DATA_HIGH, 75));

        receiver.on_data_changed(vec![broken, weather_event("20°", "11°", None)]);

        assert_eq!(receiver.malformed_count(), 1);
        assert_eq!(queue.recv().await.unwrap().display_text, "20°/11°");
    }

    #[tokio::test]
    async fn full_queue_keeps_the_newest_update() {
        let (receiver, mut queue) = SnapshotReceiver::new(1);
        receiver.on_data_changed(vec![
            weather_event("1°", "0°", None),
            weather_event("2°", "0°", None),
            weather_event("3°", "0°", None),
        ]);

        assert_eq!(queue.recv().await.unwrap().display_text, "3°/0°");
        assert_eq!(receiver.dropped_count(), 2);
    }

    #[test]
    fn updates_after_the_worker_exits_are_counted() {
        let (receiver, queue) = SnapshotReceiver::new(4);
        drop(queue);
        receiver.on_data_changed(vec![weather_event("1°", "0°", None)]);
        assert_eq!(receiver.dropped_count(), 1);
    }

    #[tokio::test]
    async fn resolved_icon_commits_text_and_icon_together() {
        let resolver = MapResolver::default();
        let asset = resolver.insert(fixture_icon_png());
        let cache = RenderCache::new();

        let update = parse_event(&weather_event("24°", "13°", Some(asset))).unwrap().unwrap();
        let kind = apply_update(update, &resolver, &cache, &settings()).await;

        assert_eq!(kind, CommitKind::Full);
        let state = cache.get();
        assert_eq!(state.display_text(), "24°/13°");
        assert!(state.icon().is_some());
        assert_eq!(state.sent_at_millis(), Some(1_000));
    }

    #[tokio::test]
    async fn failed_resolution_updates_text_and_keeps_icon() {
        let resolver = MapResolver::default();
        let good = resolver.insert(fixture_icon_png());
        let cache = RenderCache::new();

        let first = parse_event(&weather_event("70°", "50°", Some(good))).unwrap().unwrap();
        apply_update(first, &resolver, &cache, &settings()).await;
        let previous_icon = cache.get().icon().cloned();
        assert!(previous_icon.is_some());

        let unknown = AssetRef::new(999, 0);
        let second = parse_event(&weather_event("75°", "60°", Some(unknown))).unwrap().unwrap();
        let kind = apply_update(second, &resolver, &cache, &settings()).await;

        assert_eq!(kind, CommitKind::TextOnly);
        let state = cache.get();
        assert_eq!(state.display_text(), "75°/60°");
        assert_eq!(state.icon().cloned(), previous_icon);
    }

    #[tokio::test]
    async fn undecodable_or_oversized_icons_degrade_to_text() {
        let resolver = MapResolver::default();
        let garbage = resolver.insert(vec![0u8; 32]);
        let large = resolver.insert(fixture_icon_png());
        let cache = RenderCache::new();
        let tight = ResolveSettings { max_icon_bytes: 16, ..settings() };

        let update = parse_event(&weather_event("1°", "0°", Some(garbage))).unwrap().unwrap();
        assert_eq!(apply_update(update, &resolver, &cache, &settings()).await, CommitKind::TextOnly);

        let update = parse_event(&weather_event("2°", "0°", Some(large))).unwrap().unwrap();
        assert_eq!(apply_update(update, &resolver, &cache, &tight).await, CommitKind::TextOnly);

        assert_eq!(*cache.get(), RenderState::new("2°/0°", None).with_sent_at(Some(1_000)));
    }

    #[tokio::test]
    async fn icon_over_the_dimension_cap_degrades_to_text() {
        let resolver = MapResolver::default();
        let asset = resolver.insert(fixture_icon_png());
        let cache = RenderCache::new();
        let tiny = ResolveSettings { max_icon_dimension: 8, ..settings() };

        let update = parse_event(&weather_event("5°", "1°", Some(asset))).unwrap().unwrap();
        assert_eq!(apply_update(update, &resolver, &cache, &tiny).await, CommitKind::TextOnly);
        assert_eq!(cache.get().display_text(), "5°/1°");
        assert!(cache.get().icon().is_none());
    }

    #[tokio::test]
    async fn worker_commits_in_delivery_order() {
        let resolver = Arc::new(MapResolver::default());
        let asset = resolver.insert(fixture_icon_png());
        let cache = RenderCache::new();
        let (receiver, queue) = SnapshotReceiver::new(8);
        let cancel = CancellationToken::new();
        let mut commits = cache.subscribe();

        let worker =
            ReceiverWorker::spawn(queue, resolver.clone(), cache.clone(), settings(), cancel.clone());

        receiver.on_data_changed(vec![
            weather_event("10°", "1°", Some(asset)),
            weather_event("11°", "2°", None),
        ]);

        commits.wait_for(|state| state.display_text() == "11°/2°").await.unwrap();
        assert!(cache.get().icon().is_some(), "text-only commit keeps the first icon");

        cancel.cancel();
        worker.await.unwrap();
    }
}
