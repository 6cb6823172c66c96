//! Watch face host surface: synchronous callbacks in, invalidations out

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::paint::{FaceStyle, Frame, Layout, paint};
use super::scheduler::{HostSignal, Invalidate, RedrawScheduler, RenderLoop};
use super::surface::{Rect, Surface};
use crate::cache::RenderCache;
use crate::clock::Clock;
use crate::config::FaceConfig;

/// Device capabilities reported by the host once the surface exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceProperties {
    pub low_bit_ambient: bool,
    pub burn_in_protection: bool,
}


/// The consumer's rendering engine.
///
/// Host callbacks are synchronous and cheap: mode changes are forwarded to a
/// [`RenderLoop`] task that calls `invalidate` when a redraw is due. The host then
/// calls [`on_draw`](Self::on_draw), which paints the latest cached state.
/// The UTC offset is read from the clock on every draw, so DST shifts show up
/// without a time zone callback.
///
/// Must be created inside a tokio runtime.
pub struct WatchFace {
    cache: RenderCache,
    clock: Arc<dyn Clock>,
    layout: Layout,
    no_data_label: String,
    style: Mutex<FaceStyle>,
    signals: mpsc::UnboundedSender<HostSignal>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WatchFace {
    pub fn new(
        cache: RenderCache,
        clock: Arc<dyn Clock>,
        invalidate: impl Invalidate,
        config: &FaceConfig,
    ) -> Self {
        let (signals, signal_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = RenderLoop::spawn(
            RedrawScheduler::new(config.active_interval()),
            signal_rx,
            cache.subscribe(),
            Arc::clone(&clock),
            Arc::new(invalidate),
            cancel.clone(),
        );
        info!(offset = %clock.utc_offset(), interval = ?config.active_interval(), "Watch face created");

        Self {
            cache,
            clock,
            layout: Layout::default(),
            no_data_label: config.no_data_label.clone(),
            style: Mutex::new(FaceStyle::default()),
            signals,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Replace the layout metrics
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn on_visibility_changed(&self, visible: bool) {
        self.signal(HostSignal::Visibility(visible));
    }

    pub fn on_ambient_mode_changed(&self, ambient: bool) {
        self.style.lock().ambient = ambient;
        self.signal(HostSignal::Ambient(ambient));
    }

    pub fn on_time_zone_changed(&self) {
        debug!(offset = %self.clock.utc_offset(), "Time zone changed");
        self.signal(HostSignal::TimeZoneChanged);
    }

    /// Minute tick delivered by the host in ambient mode
    pub fn on_time_tick(&self) {
        self.signal(HostSignal::TimeTick);
    }

    pub fn on_properties_changed(&self, properties: DeviceProperties) {
        let mut style = self.style.lock();
        style.low_bit_ambient = properties.low_bit_ambient;
        style.burn_in_protection = properties.burn_in_protection;
    }

    pub fn on_apply_window_insets(&self, is_round: bool) {
        self.style.lock().is_round = is_round;
    }

    /// Paint the current time and the latest cached weather
    pub fn on_draw(&self, surface: &mut dyn Surface, bounds: Rect) {
        let rendered = self.cache.get();
        let style = *self.style.lock();
        let frame = Frame {
            local_time: self.clock.local_time(self.clock.now_millis(), self.clock.utc_offset()),
            state: &rendered,
            style,
            no_data_label: &self.no_data_label,
        };
        paint(surface, bounds, &frame, &self.layout);
    }

    /// Current paint style
    pub fn style(&self) -> FaceStyle {
        *self.style.lock()
    }

    /// Stop the tick timer. Later callbacks are ignored.
    pub fn destroy(&self) {
        self.cancel.cancel();
        info!("Watch face destroyed");
    }

    /// Wait for the render loop to exit after [`destroy`](Self::destroy)
    pub async fn join(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Render loop ended abnormally");
            }
        }
    }

    fn signal(&self, signal: HostSignal) {
        if self.signals.send(signal).is_err() {
            debug!(?signal, "Render loop gone, dropping host signal");
        }
    }
}

impl Drop for WatchFace {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
