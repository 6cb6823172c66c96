//! Upstream weather records and condition codes

use serde::{Deserialize, Serialize};

/// One day of forecast as stored on the primary device.
///
/// Temperatures are stored in Celsius; unit conversion happens at format time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// OpenWeatherMap condition code
    pub weather_id: i32,
    /// Daily maximum in Celsius
    pub max_temp: f64,
    /// Daily minimum in Celsius
    pub min_temp: f64,
}

impl WeatherRecord {
    /// Create a new record
    pub fn new(weather_id: i32, max_temp: f64, min_temp: f64) -> Self {
        Self { weather_id, max_temp, min_temp }
    }

    /// Condition group for icon lookup
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_code(self.weather_id)
    }
}

/// Icon group a condition code maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherCondition {
    Storm,
    LightRain,
    Rain,
    Snow,
    Fog,
    Clear,
    LightClouds,
    Clouds,
}

impl WeatherCondition {
    /// All condition groups, in icon table order
    pub const ALL: [WeatherCondition; 8] = [
        WeatherCondition::Storm,
        WeatherCondition::LightRain,
        WeatherCondition::Rain,
        WeatherCondition::Snow,
        WeatherCondition::Fog,
        WeatherCondition::Clear,
        WeatherCondition::LightClouds,
        WeatherCondition::Clouds,
    ];

    /// Map an OpenWeatherMap condition code to its icon group.
    ///
    /// Unknown codes fall back to [`WeatherCondition::Storm`], matching the
    /// forecast app's catch-all icon.
    pub fn from_code(code: i32) -> Self {
        match code {
            200..=232 => WeatherCondition::Storm,
            300..=321 => WeatherCondition::LightRain,
            500..=504 => WeatherCondition::Rain,
            511 => WeatherCondition::Snow,
            520..=531 => WeatherCondition::Rain,
            600..=622 => WeatherCondition::Snow,
            701..=760 => WeatherCondition::Fog,
            761 | 771 | 781 => WeatherCondition::Storm,
            800 => WeatherCondition::Clear,
            801 => WeatherCondition::LightClouds,
            802..=804 => WeatherCondition::Clouds,
            900..=906 => WeatherCondition::Storm,
            951..=957 => WeatherCondition::Clear,
            958..=962 => WeatherCondition::Storm,
            _ => WeatherCondition::Storm,
        }
    }

    /// Short lowercase name, used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            WeatherCondition::Storm => "storm",
            WeatherCondition::LightRain => "light_rain",
            WeatherCondition::Rain => "rain",
            WeatherCondition::Snow => "snow",
            WeatherCondition::Fog => "fog",
            WeatherCondition::Clear => "clear",
            WeatherCondition::LightClouds => "light_clouds",
            WeatherCondition::Clouds => "clouds",
        }
    }
}

/// Display unit for temperatures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Metric,
    Imperial,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn groups_openweathermap_codes() {
        assert_eq!(WeatherCondition::from_code(211), WeatherCondition::Storm);
        assert_eq!(WeatherCondition::from_code(301), WeatherCondition::LightRain);
        assert_eq!(WeatherCondition::from_code(502), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_code(511), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_code(521), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_code(601), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_code(741), WeatherCondition::Fog);
        assert_eq!(WeatherCondition::from_code(781), WeatherCondition::Storm);
        assert_eq!(WeatherCondition::from_code(800), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_code(801), WeatherCondition::LightClouds);
        assert_eq!(WeatherCondition::from_code(804), WeatherCondition::Clouds);
        assert_eq!(WeatherCondition::from_code(955), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_code(-1), WeatherCondition::Storm);
    }

    #[test]
    fn record_condition_uses_its_code() {
        assert_eq!(WeatherRecord::new(500, 12.0, 4.0).condition(), WeatherCondition::Rain);
    }

    #[test]
    fn units_deserialize_lowercase() {
        let unit: TemperatureUnit = serde_yaml_ng::from_str("imperial").unwrap();
        assert_eq!(unit, TemperatureUnit::Imperial);
    }

    proptest! {
        #[test]
        fn every_code_maps_to_a_named_group(code in any::<i32>()) {
            let condition = WeatherCondition::from_code(code);
            prop_assert!(WeatherCondition::ALL.contains(&condition));
            prop_assert!(!condition.as_str().is_empty());
        }
    }
}
