//! Redraw scheduling: when to invalidate and when the next tick is due
//!
//! [`RedrawScheduler`] is a pure state machine fed with wall-clock millis; the
//! [`RenderLoop`] task turns its [`Directive`]s into invalidations and sleeps.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::types::RenderState;

/// Tick mode of the face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not started, or destroyed
    Stopped,
    /// Visible and interactive: redraw every interval
    ActiveTicking,
    /// Invisible or ambient: only forced redraws
    Suspended,
}

/// What to do with the pending tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Keep,
    Cancel,
    After(Duration),
}

/// Result of feeding one input to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive {
    pub redraw: bool,
    pub schedule: Schedule,
}

impl Directive {
    const FORCED: Directive = Directive { redraw: true, schedule: Schedule::Keep };
    const IDLE: Directive = Directive { redraw: false, schedule: Schedule::Cancel };
}

/// Delay until the next multiple of `interval` after `now_millis`.
///
/// Always in `(0, interval]`, so ticks land on wall-clock boundaries.
pub fn tick_delay(now_millis: i64, interval: Duration) -> Duration {
    let interval = (interval.as_millis() as i64).max(1);
    let remainder = now_millis.rem_euclid(interval);
    Duration::from_millis((interval - remainder) as u64)
}

#[derive(Debug, Clone)]
pub struct RedrawScheduler {
    state: SchedulerState,
    visible: bool,
    ambient: bool,
    interval: Duration,
}

impl RedrawScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { state: SchedulerState::Stopped, visible: false, ambient: false, interval }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn on_visibility_changed(&mut self, visible: bool, now_millis: i64) -> Directive {
        self.visible = visible;
        self.retarget(now_millis)
    }

    pub fn on_ambient_mode_changed(&mut self, ambient: bool, now_millis: i64) -> Directive {
        self.ambient = ambient;
        self.retarget(now_millis)
    }

    /// The pending tick fired
    pub fn on_tick(&mut self, now_millis: i64) -> Directive {
        match self.state {
            SchedulerState::ActiveTicking => Directive {
                redraw: true,
                schedule: Schedule::After(tick_delay(now_millis, self.interval)),
            },
            _ => Directive::IDLE,
        }
    }

    /// Time zone change, host minute tick or cache commit.
    ///
    /// Redraws in every state, including before the first visibility callback,
    /// and leaves the pending tick untouched.
    pub fn on_forced(&self) -> Directive {
        Directive::FORCED
    }

    pub fn stop(&mut self) -> Directive {
        self.state = SchedulerState::Stopped;
        Directive::IDLE
    }

    fn retarget(&mut self, now_millis: i64) -> Directive {
        let next = if self.visible && !self.ambient {
            SchedulerState::ActiveTicking
        } else {
            SchedulerState::Suspended
        };
        if next != self.state {
            debug!(from = ?self.state, to = ?next, "Redraw scheduler transition");
        }
        self.state = next;

        match next {
            SchedulerState::ActiveTicking => Directive {
                redraw: true,
                schedule: Schedule::After(tick_delay(now_millis, self.interval)),
            },
            // A visible face still repaints once for the new mode
            _ => Directive { redraw: self.visible, schedule: Schedule::Cancel },
        }
    }
}

/// Host callbacks forwarded to the render loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    Visibility(bool),
    Ambient(bool),
    TimeZoneChanged,
    TimeTick,
}

/// Asks the host to call `on_draw` soon. Must not block.
pub trait Invalidate: Send + Sync + 'static {
    fn invalidate(&self);
}

impl<F> Invalidate for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn invalidate(&self) {
        self()
    }
}

/// Task driving a [`RedrawScheduler`] from host signals, cache commits and tick deadlines
pub struct RenderLoop;

impl RenderLoop {
    pub fn spawn(
        mut scheduler: RedrawScheduler,
        mut signals: mpsc::UnboundedReceiver<HostSignal>,
        mut commits: watch::Receiver<Arc<RenderState>>,
        clock: Arc<dyn Clock>,
        invalidate: Arc<dyn Invalidate>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!(interval = ?scheduler.interval(), "Render loop started");
            let mut deadline: Option<Instant> = None;
            let mut commits_open = true;
            let mut redraws = 0u64;

            loop {
                let next_tick = deadline;
                let tick = async move {
                    match next_tick {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                };

                let directive = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    signal = signals.recv() => match signal {
                        Some(signal) => {
                            trace!(?signal, "Host signal");
                            let now = clock.now_millis();
                            match signal {
                                HostSignal::Visibility(visible) => scheduler.on_visibility_changed(visible, now),
                                HostSignal::Ambient(ambient) => scheduler.on_ambient_mode_changed(ambient, now),
                                HostSignal::TimeZoneChanged | HostSignal::TimeTick => scheduler.on_forced(),
                            }
                        }
                        None => break,
                    },
                    changed = commits.changed(), if commits_open => match changed {
                        Ok(()) => scheduler.on_forced(),
                        Err(_) => {
                            commits_open = false;
                            continue;
                        }
                    },
                    _ = tick => {
                        deadline = None;
                        scheduler.on_tick(clock.now_millis())
                    }
                };

                if directive.redraw {
                    redraws += 1;
                    invalidate.invalidate();
                }
                match directive.schedule {
                    Schedule::Keep => {}
                    Schedule::Cancel => deadline = None,
                    Schedule::After(delay) => deadline = Some(Instant::now() + delay),
                }
            }

            scheduler.stop();
            debug!(redraws, "Render loop ended");
        })
    }
}
