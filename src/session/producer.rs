//! Producer session: connect, build, push once, disconnect

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use super::state::{Role, SessionEvent, SessionState, transition};
use crate::builder::SnapshotBuilder;
use crate::transport::Transport;
use crate::{SyncError, TransportConfig};

/// How one sync cycle ended
#[derive(Debug)]
pub enum SyncOutcome {
    /// Exactly one message was accepted by the transport
    Pushed { created_at_millis: i64 },
    /// No weather row for today; nothing was sent
    Skipped,
    /// Connect, build or push failed; logged and reported here
    Failed(SyncError),
}

impl SyncOutcome {
    pub fn is_pushed(&self) -> bool {
        matches!(self, SyncOutcome::Pushed { .. })
    }
}

/// Owns the producer's connection to the sync transport.
///
/// Each [`start_sync`](Self::start_sync) runs one cycle on its own connection:
/// connect, build a snapshot, push it once, disconnect. At most one cycle is in
/// flight per session.
pub struct ProducerSession<T: Transport> {
    transport: Arc<T>,
    builder: Arc<SnapshotBuilder>,
    state: watch::Sender<SessionState>,
    connect_timeout: Duration,
}

impl<T: Transport> ProducerSession<T> {
    pub fn new(transport: T, builder: SnapshotBuilder, config: &TransportConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            transport: Arc::new(transport),
            builder: Arc::new(builder),
            state,
            connect_timeout: config.connect_timeout(),
        }
    }

    /// Begin a sync cycle.
    ///
    /// Returns `None` without side effects when a cycle is already connecting or
    /// connected. Otherwise spawns the cycle on the current tokio runtime and
    /// returns its handle. Failures never escape the task: they are logged and
    /// reported as [`SyncOutcome::Failed`].
    pub fn start_sync(&self) -> Option<JoinHandle<SyncOutcome>> {
        if !apply(&self.state, SessionEvent::Start) {
            debug!(state = %self.state(), "Sync already in flight, ignoring start");
            return None;
        }

        info!("Starting weather sync");
        let transport = Arc::clone(&self.transport);
        let builder = Arc::clone(&self.builder);
        let state = self.state.clone();
        let connect_timeout = self.connect_timeout;

        Some(tokio::spawn(async move {
            run_cycle(transport.as_ref(), &builder, &state, connect_timeout).await
        }))
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Lifecycle transitions, starting with the current state
    pub fn state_updates(&self) -> impl Stream<Item = SessionState> + 'static {
        WatchStream::new(self.state.subscribe())
    }

    /// The transport this session owns
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

fn apply(state: &watch::Sender<SessionState>, event: SessionEvent) -> bool {
    state.send_if_modified(|current| match transition(Role::Producer, *current, event) {
        Some(next) => {
            *current = next;
            true
        }
        None => false,
    })
}

async fn run_cycle<T: Transport>(
    transport: &T,
    builder: &SnapshotBuilder,
    state: &watch::Sender<SessionState>,
    connect_timeout: Duration,
) -> SyncOutcome {
    let connected = match tokio::time::timeout(connect_timeout, transport.connect()).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::timeout("connect", connect_timeout)),
    };
    if let Err(e) = connected {
        warn!(error = %e, "Producer connection failed");
        apply(state, SessionEvent::ConnectionFailed);
        return SyncOutcome::Failed(e);
    }
    apply(state, SessionEvent::Connected);
    debug!("Producer connected");

    let outcome = match builder.build() {
        Ok(Some(snapshot)) => {
            let created_at_millis = snapshot.created_at_millis();
            match transport.push(snapshot.to_push_message()).await {
                Ok(()) => {
                    info!(
                        high = snapshot.high_temp(),
                        low = snapshot.low_temp(),
                        created_at_millis,
                        "Weather snapshot pushed"
                    );
                    SyncOutcome::Pushed { created_at_millis }
                }
                Err(e) => {
                    warn!(error = %e, "Weather push failed");
                    SyncOutcome::Failed(e)
                }
            }
        }
        Ok(None) => {
            debug!("No weather data for today, skipping push");
            SyncOutcome::Skipped
        }
        Err(e) => {
            warn!(error = %e, "Failed to build weather snapshot");
            SyncOutcome::Failed(e)
        }
    };

    let event =
        if outcome.is_pushed() { SessionEvent::Pushed } else { SessionEvent::NothingPushed };
    apply(state, event);
    transport.disconnect().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::test_utils::{ProducerFixture, producer_fixture};
    use crate::types::WeatherRecord;

    #[tokio::test(start_paused = true)]
    async fn rapid_double_start_pushes_once() {
        let ProducerFixture { hub, producer, store, .. } = producer_fixture();
        store.insert(crate::test_utils::fixture_day(), WeatherRecord::new(800, 24.0, 13.0));
        producer.transport().set_connect_delay(Duration::from_millis(200));

        let first = producer.start_sync().expect("first start spawns a cycle");
        assert_eq!(producer.state(), SessionState::Connecting);
        assert!(producer.start_sync().is_none());

        let outcome = first.await.unwrap();
        assert!(outcome.is_pushed());
        assert_eq!(hub.push_count(), 1);
        assert_eq!(producer.transport().connect_attempts(), 1);
        assert_eq!(producer.state(), SessionState::Pushed);
        assert!(!producer.transport().is_connected());
    }

    #[tokio::test]
    async fn empty_store_skips_without_error() {
        let ProducerFixture { hub, producer, .. } = producer_fixture();

        let outcome = producer.start_sync().unwrap().await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Skipped));
        assert_eq!(hub.push_count(), 0);
        assert_eq!(producer.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn connection_failure_is_reported_not_retried() {
        let ProducerFixture { hub, producer, store, .. } = producer_fixture();
        store.insert(crate::test_utils::fixture_day(), WeatherRecord::new(800, 24.0, 13.0));
        producer.transport().fail_next_connect("wearable api unavailable");

        let outcome = producer.start_sync().unwrap().await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Failed(SyncError::Connection { .. })));
        assert_eq!(producer.state(), SessionState::Failed);
        assert_eq!(hub.push_count(), 0);
        assert_eq!(producer.transport().connect_attempts(), 1);

        // The caller re-invokes; the next cycle succeeds
        let outcome = producer.start_sync().unwrap().await.unwrap();
        assert!(outcome.is_pushed());
        assert_eq!(hub.push_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_timeout_fails_the_cycle() {
        let ProducerFixture { producer, .. } = producer_fixture();
        producer.transport().set_connect_delay(Duration::from_secs(60));

        let outcome = producer.start_sync().unwrap().await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Failed(SyncError::Timeout { .. })));
        assert_eq!(producer.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn each_cycle_pushes_a_fresh_message() {
        let ProducerFixture { hub, producer, store, clock } = producer_fixture();
        store.insert(crate::test_utils::fixture_day(), WeatherRecord::new(800, 24.0, 13.0));

        producer.start_sync().unwrap().await.unwrap();
        clock.advance_millis(60_000);
        producer.start_sync().unwrap().await.unwrap();

        assert_eq!(hub.push_count(), 2);
        let stored = hub.item(crate::types::WEATHER_DATA_PATH).unwrap();
        assert_eq!(stored.long(crate::types::WEATHER_DATA_TIME), Some(clock.now_millis()));
    }
}
