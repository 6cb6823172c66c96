//! Temperature display formatting

use crate::types::TemperatureUnit;

/// Degree sign appended to every formatted temperature
pub const DEGREE: char = '\u{00B0}';

/// Format a Celsius reading for display, e.g. `"24°"` or `"75°"`.
///
/// Rounds half away from zero and never renders a negative zero.
pub fn format_temperature(celsius: f64, unit: TemperatureUnit) -> String {
    let value = match unit {
        TemperatureUnit::Metric => celsius,
        TemperatureUnit::Imperial => celsius * 1.8 + 32.0,
    };
    // -0.0 + 0.0 == +0.0
    format!("{:.0}{}", value.round() + 0.0, DEGREE)
}
