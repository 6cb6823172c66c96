//! Core data model shared by the producer and consumer sides.
//!
//! - [`WeatherRecord`] is the upstream row the producer reads
//! - [`Snapshot`] is the immutable bundle built once per sync cycle
//! - [`PushMessage`] is the addressed wire item; [`Asset`] travels producer-side,
//!   [`AssetRef`] consumer-side
//! - [`RenderState`] is what the face paints, owned by the render cache

mod message;
mod render_state;
mod snapshot;
mod weather;

pub use message::{
    Asset, AssetRef, DataEvent, DataEventKind, FieldValue, PushMessage, WEATHER_DATA_HIGH,
    WEATHER_DATA_ICON, WEATHER_DATA_LOW, WEATHER_DATA_PATH, WEATHER_DATA_TIME,
};
pub use render_state::{Icon, MAX_ICON_DIMENSION, NO_DATA, RenderState, compose_display_text};
pub use snapshot::Snapshot;
pub use weather::{TemperatureUnit, WeatherCondition, WeatherRecord};
