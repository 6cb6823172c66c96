//! Render cache: the one piece of state shared between the receiver and the face
//!
//! A single-slot watch channel. Readers always observe a complete
//! [`RenderState`]; text and icon are swapped together.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::trace;

use crate::types::RenderState;

/// Atomic holder of the latest displayable state.
///
/// Clones share the same slot. Starts out as [`RenderState::no_data`].
#[derive(Clone)]
pub struct RenderCache {
    slot: Arc<watch::Sender<Arc<RenderState>>>,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RenderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCache").field("state", &*self.get()).finish()
    }
}

impl RenderCache {
    pub fn new() -> Self {
        Self::with_state(RenderState::no_data())
    }

    pub fn with_state(state: RenderState) -> Self {
        let (slot, _) = watch::channel(Arc::new(state));
        Self { slot: Arc::new(slot) }
    }

    /// The latest committed state
    pub fn get(&self) -> Arc<RenderState> {
        Arc::clone(&self.slot.borrow())
    }

    /// Replace the whole state
    pub fn commit(&self, state: RenderState) {
        trace!(text = state.display_text(), has_icon = state.icon().is_some(), "Render cache commit");
        self.slot.send_replace(Arc::new(state));
    }

    /// Replace the text and timestamp, keeping whatever icon is current.
    ///
    /// The read of the current icon and the write happen under one lock, so a
    /// concurrent [`commit`](Self::commit) is never half-overwritten.
    pub fn commit_text(&self, display_text: String, sent_at_millis: Option<i64>) {
        trace!(text = %display_text, "Render cache text commit");
        self.slot.send_modify(|current| {
            *current = Arc::new(current.with_text(display_text, sent_at_millis));
        });
    }

    /// Receiver notified after every commit
    pub fn subscribe(&self) -> watch::Receiver<Arc<RenderState>> {
        self.slot.subscribe()
    }

    /// Commits made after this call, as a stream
    pub fn updates(&self) -> impl Stream<Item = Arc<RenderState>> + 'static {
        WatchStream::from_changes(self.slot.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::solid_icon;
    use futures::StreamExt;

    #[test]
    fn starts_with_no_data() {
        let cache = RenderCache::new();
        assert_eq!(*cache.get(), RenderState::no_data());
        assert!(!cache.get().has_data());
    }

    #[test]
    fn get_returns_the_last_commit() {
        let cache = RenderCache::new();
        let state = RenderState::new("24°/13°", Some(solid_icon(8, [255, 0, 0, 255])))
            .with_sent_at(Some(42));
        cache.commit(state.clone());
        assert_eq!(*cache.get(), state);
    }

    #[test]
    fn text_commit_keeps_the_icon() {
        let icon = solid_icon(8, [0, 0, 255, 255]);
        let cache = RenderCache::with_state(RenderState::new("1°/0°", Some(icon.clone())));

        cache.commit_text("75°/60°".to_string(), Some(7));

        let state = cache.get();
        assert_eq!(state.display_text(), "75°/60°");
        assert_eq!(state.icon(), Some(&icon));
        assert_eq!(state.sent_at_millis(), Some(7));
    }

    #[test]
    fn clones_share_the_slot() {
        let cache = RenderCache::new();
        let other = cache.clone();
        other.commit(RenderState::new("3°/1°", None));
        assert_eq!(cache.get().display_text(), "3°/1°");
    }

    #[tokio::test]
    async fn updates_yield_each_commit() {
        let cache = RenderCache::new();
        let mut updates = Box::pin(cache.updates());

        cache.commit(RenderState::new("5°/2°", None));
        assert_eq!(updates.next().await.unwrap().display_text(), "5°/2°");
    }

    #[test]
    fn concurrent_commits_never_mix_text_and_icon() {
        // Each writer pairs its text with an icon whose width encodes the same id;
        // a reader must never see one writer's text with another's icon.
        let cache = RenderCache::new();
        let writers: Vec<_> = (1u32..=4)
            .map(|id| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let icon = solid_icon(id, [id as u8, 0, 0, 255]);
                        cache.commit(RenderState::new(format!("{id}°/{id}°"), Some(icon)));
                    }
                })
            })
            .collect();

        for _ in 0..2_000 {
            let state = cache.get();
            if let Some(icon) = state.icon() {
                assert_eq!(state.display_text(), format!("{0}°/{0}°", icon.width()));
            }
        }
        for writer in writers {
            writer.join().unwrap();
        }
    }
}
