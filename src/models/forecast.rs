use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Probability of precipitation for the next forecast block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RainForecast {
    /// Percent, 0-100.
    pub probability: f64,
    /// Start of the forecast block, when known.
    pub forecast_time: Option<DateTime<Utc>>,
}

impl RainForecast {
    pub fn new(probability: f64, forecast_time: Option<DateTime<Utc>>) -> Self {
        let probability = if probability.is_finite() {
            probability.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            probability,
            forecast_time,
        }
    }

    /// Used whenever the forecast cannot be fetched.
    pub fn neutral() -> Self {
        Self {
            probability: 0.0,
            forecast_time: None,
        }
    }

    /// Convert an OpenWeatherMap `pop` fraction (0.0-1.0) to percent.
    pub fn from_pop(pop: f64, forecast_time: Option<DateTime<Utc>>) -> Self {
        Self::new(pop * 100.0, forecast_time)
    }
}

impl Default for RainForecast {
    fn default() -> Self {
        Self::neutral()
    }
}
