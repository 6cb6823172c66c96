//! Consumer session: keep a listening connection while the face is alive

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{Role, SessionEvent, SessionState, transition};
use crate::cache::RenderCache;
use crate::receiver::{ReceiverWorker, ResolveSettings, SnapshotReceiver};
use crate::transport::{
    AssetResolver, ConnectionEvent, DataListener, ListenerId, SuspendCause, Transport,
};
use crate::{SyncError, TransportConfig};

/// Tasks owned by one `start()`..`teardown()` span
struct Running {
    cancel: CancellationToken,
    supervisor: JoinHandle<()>,
    worker: JoinHandle<()>,
}

/// Owns the consumer's connection and its registered [`SnapshotReceiver`].
///
/// [`start`](Self::start) connects and registers the receiver; a supervisor task
/// re-registers after every suspension. [`teardown`](Self::teardown) removes the
/// receiver and disconnects. Commits land in the shared [`RenderCache`].
pub struct ConsumerSession<T: Transport> {
    transport: Arc<T>,
    cache: RenderCache,
    config: TransportConfig,
    state: watch::Sender<SessionState>,
    listener: Arc<Mutex<Option<ListenerId>>>,
    running: Mutex<Option<Running>>,
    retired: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Transport> ConsumerSession<T> {
    pub fn new(transport: T, cache: RenderCache, config: &TransportConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            transport: Arc::new(transport),
            cache,
            config: config.clone(),
            state,
            listener: Arc::new(Mutex::new(None)),
            running: Mutex::new(None),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Connect and start listening.
    ///
    /// Returns `false` without side effects when a connection is already owned.
    /// Connection progress is reported through [`state`](Self::state); a failed
    /// connect leaves the session in [`SessionState::Failed`] until the next call.
    pub fn start(&self) -> bool {
        if !apply(&self.state, SessionEvent::Start) {
            debug!(state = %self.state(), "Consumer already connected, ignoring start");
            return false;
        }

        // A previous span that ended in Failed still has an idle worker
        if let Some(previous) = self.running.lock().take() {
            previous.cancel.cancel();
            self.retired.lock().push(previous.worker);
        }

        let (receiver, queue) = SnapshotReceiver::new(self.config.dispatch_capacity);
        let cancel = CancellationToken::new();

        let worker = ReceiverWorker::spawn(
            queue,
            Arc::clone(&self.transport) as Arc<dyn AssetResolver>,
            self.cache.clone(),
            ResolveSettings::from(&self.config),
            cancel.child_token(),
        );

        let supervisor = tokio::spawn(supervise(
            Arc::clone(&self.transport),
            Arc::new(receiver),
            self.state.clone(),
            Arc::clone(&self.listener),
            self.config.connect_timeout(),
            self.config.handshake_path.clone(),
            cancel.clone(),
        ));

        info!("Consumer session starting");
        *self.running.lock() = Some(Running { cancel, supervisor, worker });
        true
    }

    /// Stop listening and release the connection.
    ///
    /// The receiver is unregistered before this returns, so no further items are
    /// accepted. An icon resolution already in flight is left to finish or time
    /// out; its commit is harmless.
    pub async fn teardown(&self) {
        let running = self.running.lock().take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.supervisor.await {
                warn!(error = %e, "Consumer supervisor ended abnormally");
            }
            self.retired.lock().push(running.worker);
        }

        if let Some(id) = self.listener.lock().take() {
            self.transport.remove_listener(id);
        }
        self.transport.disconnect().await;

        if apply(&self.state, SessionEvent::Teardown) {
            info!("Consumer session torn down");
        }
    }

    /// Wait for receiver workers from finished spans to exit.
    pub async fn drain(&self) {
        let workers = std::mem::take(&mut *self.retired.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Receiver worker ended abnormally");
            }
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch receiver over lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Lifecycle transitions, starting with the current state
    pub fn state_updates(&self) -> impl Stream<Item = SessionState> + 'static {
        WatchStream::new(self.state.subscribe())
    }

    /// The cache this session commits to
    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// The transport this session owns
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Drop for ConsumerSession<T> {
    fn drop(&mut self) {
        if let Some(running) = self.running.lock().take() {
            running.cancel.cancel();
        }
        if let Some(id) = self.listener.lock().take() {
            self.transport.remove_listener(id);
        }
    }
}

fn apply(state: &watch::Sender<SessionState>, event: SessionEvent) -> bool {
    state.send_if_modified(|current| match transition(Role::Consumer, *current, event) {
        Some(next) => {
            *current = next;
            true
        }
        None => false,
    })
}

/// Connect, register, wait for suspension, repeat. Exits on cancel or failed connect.
async fn supervise<T: Transport>(
    transport: Arc<T>,
    receiver: Arc<SnapshotReceiver>,
    state: watch::Sender<SessionState>,
    listener: Arc<Mutex<Option<ListenerId>>>,
    connect_timeout: Duration,
    handshake_path: Option<String>,
    cancel: CancellationToken,
) {
    let mut events = transport.connection_events();

    loop {
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = tokio::time::timeout(connect_timeout, transport.connect()) => match result {
                Ok(result) => result,
                Err(_) => Err(SyncError::timeout("connect", connect_timeout)),
            },
        };
        if let Err(e) = connected {
            warn!(error = %e, "Consumer connection failed");
            apply(&state, SessionEvent::ConnectionFailed);
            return;
        }

        let id = transport.add_listener(Arc::clone(&receiver) as Arc<dyn DataListener>);
        if let Some(stale) = listener.lock().replace(id) {
            transport.remove_listener(stale);
        }
        apply(&state, SessionEvent::Connected);
        info!(listener = id.0, "Listening for weather snapshots");

        if let Some(path) = handshake_path.clone() {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                match transport.send_message(&path, &[]).await {
                    Ok(()) => debug!(%path, "Handshake sent"),
                    Err(e) => warn!(error = %e, %path, "Handshake failed"),
                }
            });
        }

        let cause = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                event = events.recv() => match event {
                    Ok(ConnectionEvent::Suspended(cause)) => break cause,
                    Ok(ConnectionEvent::Disconnected) => break SuspendCause::Other(0),
                    Ok(ConnectionEvent::Connected) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Missed connection events");
                        if !transport.is_connected() {
                            break SuspendCause::Other(0);
                        }
                    }
                    Err(RecvError::Closed) => return,
                },
            }
        };

        if let Some(id) = listener.lock().take() {
            transport.remove_listener(id);
        }
        apply(&state, SessionEvent::Suspended);
        info!(cause = cause.code(), "Connection suspended, reconnecting");
    }
}
