//! In-process transport linking endpoints through a shared hub

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, trace, warn};

use crate::transport::{
    AssetResolver, ConnectionEvent, DataListener, ListenerId, SuspendCause, Transport,
};
use crate::types::{Asset, AssetRef, DataEvent, DataEventKind, PushMessage};
use crate::{Result, SyncError};

/// Shared medium between [`LocalTransport`] endpoints.
///
/// Behaves like a paired-device data layer: items are stored per path and
/// identical re-puts are deduplicated. Each endpoint keeps the asset bytes behind
/// the references it was handed, for the current item on each path and the
/// current connection only.
#[derive(Clone, Default)]
pub struct LocalHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    endpoints: Mutex<Vec<Weak<EndpointInner>>>,
    items: Mutex<HashMap<String, PushMessage<Asset>>>,
    messages: Mutex<Vec<SentMessage>>,
    next_asset_key: AtomicU64,
    pushes: AtomicUsize,
    deliveries: AtomicUsize,
}

/// A one-shot message recorded by the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub from: String,
    pub path: String,
    pub payload: Vec<u8>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new endpoint attached to this hub
    pub fn endpoint(&self, node: impl Into<String>) -> LocalTransport {
        let (events, _) = broadcast::channel(16);
        let inner = Arc::new(EndpointInner {
            node: node.into(),
            hub: Arc::clone(&self.inner),
            state: Mutex::new(EndpointState::default()),
            events,
            faults: Mutex::new(Faults::default()),
            next_listener: AtomicU64::new(1),
            connect_attempts: AtomicUsize::new(0),
        });
        self.inner.endpoints.lock().push(Arc::downgrade(&inner));
        LocalTransport { inner }
    }

    /// Number of pushes accepted by the hub
    pub fn push_count(&self) -> usize {
        self.inner.pushes.load(Ordering::SeqCst)
    }

    /// Number of event batches handed to listeners
    pub fn delivery_count(&self) -> usize {
        self.inner.deliveries.load(Ordering::SeqCst)
    }

    /// One-shot messages sent through the hub, oldest first
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.inner.messages.lock().clone()
    }

    /// Latest item stored at `path`
    pub fn item(&self, path: &str) -> Option<PushMessage<Asset>> {
        self.inner.items.lock().get(path).cloned()
    }

    /// Remove the item at `path` and notify connected endpoints
    pub fn delete_item(&self, path: &str) -> bool {
        let Some(removed) = self.inner.items.lock().remove(path) else {
            return false;
        };
        for endpoint in self.inner.live_endpoints() {
            endpoint.deliver(removed.clone(), DataEventKind::Deleted);
        }
        true
    }
}

impl HubInner {
    fn live_endpoints(&self) -> Vec<Arc<EndpointInner>> {
        let mut endpoints = self.endpoints.lock();
        endpoints.retain(|weak| weak.strong_count() > 0);
        endpoints.iter().filter_map(Weak::upgrade).collect()
    }
}

#[derive(Default)]
struct EndpointState {
    connected: bool,
    epoch: u64,
    listeners: Vec<(ListenerId, Arc<dyn DataListener>)>,
    /// Resolvable bytes by asset key, for this epoch only
    assets: HashMap<u64, Arc<[u8]>>,
    /// Keys handed out for the item currently delivered on each path
    path_assets: HashMap<String, Vec<u64>>,
}

impl EndpointState {
    /// Forget every handed-out asset; called whenever the epoch ends
    fn release_assets(&mut self) {
        self.assets.clear();
        self.path_assets.clear();
    }
}

#[derive(Default)]
struct Faults {
    connect_failures: VecDeque<String>,
    connect_delay: Option<Duration>,
    asset_gate: Option<watch::Receiver<bool>>,
    reject_messages: bool,
}

struct EndpointInner {
    node: String,
    hub: Arc<HubInner>,
    state: Mutex<EndpointState>,
    events: broadcast::Sender<ConnectionEvent>,
    faults: Mutex<Faults>,
    next_listener: AtomicU64,
    connect_attempts: AtomicUsize,
}

impl EndpointInner {
    /// Hand an item to this endpoint's listeners, if connected.
    ///
    /// Assets of the item previously delivered on the same path are released.
    /// Deletions hand out references that never resolve. Listeners are called
    /// outside the state lock.
    fn deliver(&self, item: PushMessage<Asset>, kind: DataEventKind) {
        let hub = &self.hub;
        let (event, listeners) = {
            let mut guard = self.state.lock();
            if !guard.connected || guard.listeners.is_empty() {
                trace!(node = %self.node, "Skipping delivery to idle endpoint");
                return;
            }
            let epoch = guard.epoch;
            let state = &mut *guard;

            let path = item.path().to_string();
            for key in state.path_assets.remove(&path).unwrap_or_default() {
                state.assets.remove(&key);
            }

            let retain = kind == DataEventKind::Changed;
            let mut keys = Vec::new();
            let delivered = item.map_assets(|asset| {
                let key = hub.next_asset_key.fetch_add(1, Ordering::SeqCst) + 1;
                if retain {
                    state.assets.insert(key, Arc::clone(asset.data()));
                    keys.push(key);
                }
                AssetRef::new(key, epoch)
            });
            if !keys.is_empty() {
                state.path_assets.insert(path, keys);
            }

            let event = match kind {
                DataEventKind::Changed => DataEvent::changed(delivered),
                DataEventKind::Deleted => DataEvent::deleted(delivered),
            };
            let listeners: Vec<_> = state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (event, listeners)
        };

        debug!(node = %self.node, path = event.path(), listeners = listeners.len(), "Delivering item");
        for listener in listeners {
            hub.deliveries.fetch_add(1, Ordering::SeqCst);
            listener.on_data_changed(vec![event.clone()]);
        }
    }

    fn lookup_asset(&self, asset: &AssetRef) -> Result<Arc<[u8]>> {
        let state = self.state.lock();
        if !state.connected {
            return Err(SyncError::not_connected("resolve asset"));
        }
        if asset.epoch() != state.epoch {
            return Err(SyncError::asset_resolution(format!(
                "stale reference from connection epoch {} (current {})",
                asset.epoch(),
                state.epoch
            )));
        }
        state
            .assets
            .get(&asset.key())
            .cloned()
            .ok_or_else(|| SyncError::asset_resolution(format!("unknown asset key {}", asset.key())))
    }
}

/// Releases held asset resolutions when dropped or [`released`](AssetGate::release).
pub struct AssetGate {
    open: watch::Sender<bool>,
}

impl AssetGate {
    pub fn release(&self) {
        self.open.send_replace(true);
    }
}

impl Drop for AssetGate {
    fn drop(&mut self) {
        self.open.send_replace(true);
    }
}

/// One endpoint of a [`LocalHub`].
///
/// Clones share the same endpoint. Fault-injection helpers let tests reproduce
/// failed connects, slow links, held asset fetches and suspensions.
#[derive(Clone)]
pub struct LocalTransport {
    inner: Arc<EndpointInner>,
}

impl LocalTransport {
    /// Node name this endpoint was created with
    pub fn node(&self) -> &str {
        &self.inner.node
    }

    /// Current connection epoch; increments on every successful connect
    pub fn epoch(&self) -> u64 {
        self.inner.state.lock().epoch
    }

    /// Number of `connect()` calls made on this endpoint
    pub fn connect_attempts(&self) -> usize {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// Number of currently registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }

    /// Number of asset payloads this endpoint can still resolve
    pub fn retained_assets(&self) -> usize {
        self.inner.state.lock().assets.len()
    }

    /// Make the next `connect()` fail with `reason`
    pub fn fail_next_connect(&self, reason: impl Into<String>) {
        self.inner.faults.lock().connect_failures.push_back(reason.into());
    }

    /// Delay every subsequent `connect()` by `delay`
    pub fn set_connect_delay(&self, delay: Duration) {
        self.inner.faults.lock().connect_delay = Some(delay);
    }

    /// Reject one-shot messages sent from this endpoint
    pub fn reject_messages(&self, reject: bool) {
        self.inner.faults.lock().reject_messages = reject;
    }

    /// Hold every asset resolution on this endpoint until the gate is released
    pub fn hold_asset_resolution(&self) -> AssetGate {
        let (open, gate) = watch::channel(false);
        self.inner.faults.lock().asset_gate = Some(gate);
        AssetGate { open }
    }

    /// Simulate the service dropping the link
    pub fn suspend(&self, cause: SuspendCause) {
        {
            let mut state = self.inner.state.lock();
            if !state.connected {
                return;
            }
            state.connected = false;
            state.release_assets();
        }
        info!(node = %self.inner.node, cause = cause.code(), "Connection suspended");
        let _ = self.inner.events.send(ConnectionEvent::Suspended(cause));
    }
}

#[async_trait::async_trait]
impl AssetResolver for LocalTransport {
    async fn resolve_asset(&self, asset: &AssetRef, timeout: Duration) -> Result<Arc<[u8]>> {
        let gate = self.inner.faults.lock().asset_gate.clone();
        let lookup = async {
            if let Some(mut gate) = gate {
                // A dropped gate counts as released
                let _ = gate.wait_for(|open| *open).await;
            }
            self.inner.lookup_asset(asset)
        };

        match tokio::time::timeout(timeout, lookup).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::timeout("asset resolution", timeout)),
        }
    }
}

#[async_trait::async_trait]
impl Transport for LocalTransport {
    async fn connect(&self) -> Result<()> {
        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let (delay, failure) = {
            let mut faults = self.inner.faults.lock();
            (faults.connect_delay, faults.connect_failures.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = failure {
            warn!(node = %self.inner.node, %reason, "Connect rejected");
            return Err(SyncError::connection_failed(reason));
        }

        let epoch = {
            let mut state = self.inner.state.lock();
            state.connected = true;
            state.epoch += 1;
            state.release_assets();
            state.epoch
        };
        debug!(node = %self.inner.node, epoch, "Endpoint connected");
        let _ = self.inner.events.send(ConnectionEvent::Connected);
        Ok(())
    }

    async fn disconnect(&self) {
        let was_connected = {
            let mut state = self.inner.state.lock();
            state.release_assets();
            std::mem::replace(&mut state.connected, false)
        };
        if was_connected {
            debug!(node = %self.inner.node, "Endpoint disconnected");
            let _ = self.inner.events.send(ConnectionEvent::Disconnected);
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.state.lock().connected
    }

    async fn push(&self, message: PushMessage<Asset>) -> Result<()> {
        if !self.is_connected() {
            return Err(SyncError::not_connected("push"));
        }

        let hub = &self.inner.hub;
        hub.pushes.fetch_add(1, Ordering::SeqCst);

        {
            let mut items = hub.items.lock();
            if items.get(message.path()) == Some(&message) {
                debug!(path = message.path(), "Identical item already stored, not delivering");
                return Ok(());
            }
            items.insert(message.path().to_string(), message.clone());
        }

        let me = Arc::as_ptr(&self.inner);
        for endpoint in hub.live_endpoints() {
            if Arc::as_ptr(&endpoint) != me {
                endpoint.deliver(message.clone(), DataEventKind::Changed);
            }
        }
        Ok(())
    }

    async fn send_message(&self, path: &str, payload: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(SyncError::not_connected("send message"));
        }
        if self.inner.faults.lock().reject_messages {
            return Err(SyncError::connection_failed(format!("message to {} rejected", path)));
        }
        self.inner.hub.messages.lock().push(SentMessage {
            from: self.inner.node.clone(),
            path: path.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn add_listener(&self, listener: Arc<dyn DataListener>) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::SeqCst));
        self.inner.state.lock().listeners.push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.inner.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(existing, _)| *existing != id);
        state.listeners.len() != before
    }

    fn connection_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{WEATHER_DATA_HIGH, WEATHER_DATA_ICON, WEATHER_DATA_PATH};

    fn recording_listener() -> (Arc<dyn DataListener>, Arc<Mutex<Vec<DataEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: Arc<dyn DataListener> =
            Arc::new(move |events: Vec<DataEvent>| sink.lock().extend(events));
        (listener, seen)
    }

    fn weather_item(high: &str) -> PushMessage<Asset> {
        PushMessage::new(WEATHER_DATA_PATH)
            .put_text(WEATHER_DATA_HIGH, high)
            .put_asset(WEATHER_DATA_ICON, Asset::from_bytes(vec![9u8, 9, 9]))
    }

    #[tokio::test]
    async fn push_delivers_to_peer_with_resolvable_reference() {
        let hub = LocalHub::new();
        let phone = hub.endpoint("phone");
        let watch = hub.endpoint("watch");
        let (listener, seen) = recording_listener();

        watch.connect().await.unwrap();
        watch.add_listener(listener);
        phone.connect().await.unwrap();
        phone.push(weather_item("20°")).await.unwrap();

        let events = seen.lock().clone();
        assert_eq!(events.len(), 1);
        let asset = *events[0].item.asset(WEATHER_DATA_ICON).unwrap();
        assert_eq!(asset.epoch(), watch.epoch());

        let bytes = watch.resolve_asset(&asset, Duration::from_secs(1)).await.unwrap();
        assert_eq!(bytes.as_ref(), &[9u8, 9, 9]);
    }

    #[tokio::test]
    async fn identical_items_are_deduplicated() {
        let hub = LocalHub::new();
        let phone = hub.endpoint("phone");
        let watch = hub.endpoint("watch");
        let (listener, seen) = recording_listener();

        watch.connect().await.unwrap();
        watch.add_listener(listener);
        phone.connect().await.unwrap();

        phone.push(weather_item("20°")).await.unwrap();
        phone.push(weather_item("20°")).await.unwrap();
        phone.push(weather_item("21°")).await.unwrap();

        assert_eq!(hub.push_count(), 3);
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn references_go_stale_across_reconnects() {
        let hub = LocalHub::new();
        let phone = hub.endpoint("phone");
        let watch = hub.endpoint("watch");
        let (listener, seen) = recording_listener();

        watch.connect().await.unwrap();
        watch.add_listener(listener);
        phone.connect().await.unwrap();
        phone.push(weather_item("20°")).await.unwrap();
        let asset = *seen.lock()[0].item.asset(WEATHER_DATA_ICON).unwrap();

        watch.suspend(SuspendCause::NetworkLost);
        let err = watch.resolve_asset(&asset, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, SyncError::NotConnected { .. }));

        watch.connect().await.unwrap();
        let err = watch.resolve_asset(&asset, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, SyncError::AssetResolution { .. }));
    }

    #[tokio::test]
    async fn asset_table_stays_bounded_across_pushes_and_reconnects() {
        let hub = LocalHub::new();
        let phone = hub.endpoint("phone");
        let watch = hub.endpoint("watch");
        let (listener, seen) = recording_listener();

        watch.connect().await.unwrap();
        watch.add_listener(listener);
        phone.connect().await.unwrap();

        for round in 0..1_000 {
            if round % 100 == 0 && round > 0 {
                watch.suspend(SuspendCause::NetworkLost);
                assert_eq!(watch.retained_assets(), 0);
                watch.connect().await.unwrap();
            }
            phone.push(weather_item(&format!("{}°", round))).await.unwrap();
            assert_eq!(watch.retained_assets(), 1);
        }

        // Only the latest delivery still resolves
        let events = seen.lock().clone();
        assert_eq!(events.len(), 1_000);
        let superseded = *events[998].item.asset(WEATHER_DATA_ICON).unwrap();
        let latest = *events[999].item.asset(WEATHER_DATA_ICON).unwrap();
        let err = watch.resolve_asset(&superseded, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, SyncError::AssetResolution { .. }));
        assert!(watch.resolve_asset(&latest, Duration::from_secs(1)).await.is_ok());

        watch.disconnect().await;
        assert_eq!(watch.retained_assets(), 0);
    }

    #[tokio::test]
    async fn deleted_items_release_their_assets() {
        let hub = LocalHub::new();
        let phone = hub.endpoint("phone");
        let watch = hub.endpoint("watch");
        let (listener, seen) = recording_listener();

        watch.connect().await.unwrap();
        watch.add_listener(listener);
        phone.connect().await.unwrap();
        phone.push(weather_item("20°")).await.unwrap();
        assert_eq!(watch.retained_assets(), 1);

        assert!(hub.delete_item(WEATHER_DATA_PATH));
        assert_eq!(watch.retained_assets(), 0);
        assert_eq!(seen.lock().last().map(|e| e.kind), Some(DataEventKind::Deleted));
    }

    #[tokio::test(start_paused = true)]
    async fn held_resolution_times_out() {
        let hub = LocalHub::new();
        let watch = hub.endpoint("watch");
        watch.connect().await.unwrap();
        let _gate = watch.hold_asset_resolution();

        let err = watch
            .resolve_asset(&AssetRef::new(1, watch.epoch()), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout { .. }));
    }

    #[tokio::test]
    async fn injected_connect_failure_is_reported_once() {
        let hub = LocalHub::new();
        let phone = hub.endpoint("phone");
        phone.fail_next_connect("api unavailable");

        let err = phone.connect().await.unwrap_err();
        assert!(err.to_string().contains("api unavailable"));
        assert!(!phone.is_connected());

        phone.connect().await.unwrap();
        assert!(phone.is_connected());
        assert_eq!(phone.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn suspension_is_broadcast() {
        let hub = LocalHub::new();
        let watch = hub.endpoint("watch");
        let mut events = watch.connection_events();

        watch.connect().await.unwrap();
        watch.suspend(SuspendCause::ServiceDisconnected);

        assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connected);
        assert_eq!(
            events.recv().await.unwrap(),
            ConnectionEvent::Suspended(SuspendCause::ServiceDisconnected)
        );
    }
}
