//! Upstream weather store queried by the snapshot builder

use std::collections::BTreeMap;

use chrono::NaiveDate;
use parking_lot::RwLock;

use crate::Result;
use crate::types::WeatherRecord;

/// Queryable forecast table on the primary device.
pub trait WeatherStore: Send + Sync + 'static {
    /// Forecast row for `day`, or `None` when nothing is stored for it
    fn weather_for(&self, day: NaiveDate) -> Result<Option<WeatherRecord>>;
}

/// In-memory store keyed by calendar day
#[derive(Debug, Default)]
pub struct MemoryWeatherStore {
    records: RwLock<BTreeMap<NaiveDate, WeatherRecord>>,
}

impl MemoryWeatherStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or replace the row for `day`
    pub fn insert(&self, day: NaiveDate, record: WeatherRecord) -> Option<WeatherRecord> {
        self.records.write().insert(day, record)
    }

    pub fn remove(&self, day: NaiveDate) -> Option<WeatherRecord> {
        self.records.write().remove(&day)
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl WeatherStore for MemoryWeatherStore {
    fn weather_for(&self, day: NaiveDate) -> Result<Option<WeatherRecord>> {
        Ok(self.records.read().get(&day).copied())
    }
}
