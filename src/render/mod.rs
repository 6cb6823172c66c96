//! Consumer-side rendering: redraw scheduling and the watch face paint routine
//!
//! - [`RedrawScheduler`] decides when to invalidate
//! - [`RenderLoop`] runs it against tokio time, host signals and cache commits
//! - [`paint`] draws one frame from a [`RenderState`](crate::types::RenderState) snapshot
//! - [`WatchFace`] is the host-facing surface tying them together

mod face;
mod paint;
mod scheduler;
mod surface;

pub use face::{DeviceProperties, WatchFace};
pub use paint::{FaceStyle, Frame, Layout, format_date, format_time, paint};
pub use scheduler::{
    Directive, HostSignal, Invalidate, RedrawScheduler, RenderLoop, Schedule, SchedulerState,
    tick_delay,
};
pub use surface::{Color, Paint, Rect, Surface};
