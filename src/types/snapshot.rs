//! Immutable weather snapshot produced once per sync cycle

use std::sync::Arc;

use super::message::{
    Asset, PushMessage, WEATHER_DATA_HIGH, WEATHER_DATA_ICON, WEATHER_DATA_LOW, WEATHER_DATA_PATH,
    WEATHER_DATA_TIME,
};
use super::weather::WeatherCondition;

/// Weather display data bundled for one push.
///
/// Fields are private so a built snapshot cannot be altered; every sync
/// builds a fresh one.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    icon_png: Arc<[u8]>,
    high_temp: String,
    low_temp: String,
    created_at_millis: i64,
    condition: WeatherCondition,
}

impl Snapshot {
    pub fn new(
        icon_png: impl Into<Arc<[u8]>>,
        high_temp: impl Into<String>,
        low_temp: impl Into<String>,
        created_at_millis: i64,
        condition: WeatherCondition,
    ) -> Self {
        Self {
            icon_png: icon_png.into(),
            high_temp: high_temp.into(),
            low_temp: low_temp.into(),
            created_at_millis,
            condition,
        }
    }

    /// PNG-encoded condition icon
    pub fn icon_png(&self) -> &[u8] {
        &self.icon_png
    }

    /// Formatted daily high
    pub fn high_temp(&self) -> &str {
        &self.high_temp
    }

    /// Formatted daily low
    pub fn low_temp(&self) -> &str {
        &self.low_temp
    }

    /// Producer wall-clock time at build, observability only
    pub fn created_at_millis(&self) -> i64 {
        self.created_at_millis
    }

    /// Condition group the icon was rendered for
    pub fn condition(&self) -> WeatherCondition {
        self.condition
    }

    /// Package the snapshot as the single urgent message pushed for this cycle.
    ///
    /// `Time` changes on every build, so transports that deduplicate identical
    /// items still deliver a re-push of unchanged weather.
    pub fn to_push_message(&self) -> PushMessage<Asset> {
        PushMessage::new(WEATHER_DATA_PATH)
            .put_asset(WEATHER_DATA_ICON, Asset::from_bytes(Arc::clone(&self.icon_png)))
            .put_text(WEATHER_DATA_HIGH, self.high_temp.clone())
            .put_text(WEATHER_DATA_LOW, self.low_temp.clone())
            .put_long(WEATHER_DATA_TIME, self.created_at_millis)
            .set_urgent()
    }
}
