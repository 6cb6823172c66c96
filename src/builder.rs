//! Snapshot builder: weather row to immutable snapshot

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::clock::Clock;
use crate::format::format_temperature;
use crate::icons::IconSource;
use crate::store::WeatherStore;
use crate::types::{Snapshot, TemperatureUnit};
use crate::{Result, SyncError};

/// Reads today's forecast and packages it as a [`Snapshot`].
pub struct SnapshotBuilder {
    store: Arc<dyn WeatherStore>,
    icons: Arc<dyn IconSource>,
    clock: Arc<dyn Clock>,
    unit: TemperatureUnit,
}

impl SnapshotBuilder {
    pub fn new(
        store: Arc<dyn WeatherStore>,
        icons: Arc<dyn IconSource>,
        clock: Arc<dyn Clock>,
        unit: TemperatureUnit,
    ) -> Self {
        Self { store, icons, clock, unit }
    }

    /// Display unit used for high/low
    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    /// Build a snapshot of today's weather.
    ///
    /// Returns:
    /// - `Ok(Some(snapshot))` - a row exists for today
    /// - `Ok(None)` - nothing stored for today; callers skip the push
    /// - `Err(e)` - the store or icon source failed, or the row is unusable
    pub fn build(&self) -> Result<Option<Snapshot>> {
        let now = self.clock.now_millis();
        let day = utc_day(now);

        let Some(record) = self.store.weather_for(day)? else {
            debug!(%day, "No weather row for today");
            return Ok(None);
        };

        if !record.max_temp.is_finite() || !record.min_temp.is_finite() {
            return Err(SyncError::Store {
                details: format!(
                    "non-finite temperatures for {}: max={} min={}",
                    day, record.max_temp, record.min_temp
                ),
            });
        }

        let condition = record.condition();
        let icon = self.icons.icon_png(condition)?;
        let high = format_temperature(record.max_temp, self.unit);
        let low = format_temperature(record.min_temp, self.unit);

        debug!(
            %day,
            weather_id = record.weather_id,
            condition = condition.as_str(),
            %high,
            %low,
            icon_bytes = icon.len(),
            "Built weather snapshot"
        );

        Ok(Some(Snapshot::new(icon, high, low, now, condition)))
    }
}

/// Calendar day (UTC) containing `millis`, the key the forecast table uses
pub fn utc_day(millis: i64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default().date_naive()
}
