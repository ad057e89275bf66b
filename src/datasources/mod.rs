pub mod openweathermap;

pub use openweathermap::OpenWeatherMapClient;

use crate::config::ForecastConfig;
use crate::error::{IrrigoError, Result};
use crate::models::RainForecast;
use std::future::Future;
use std::time::Duration;

/// Supplies the rain probability for a decision cycle.
pub trait ForecastProvider: Send + Sync {
    fn rain_forecast(&self) -> impl Future<Output = Result<RainForecast>> + Send;
}

/// The configured forecast provider.
pub enum ForecastSource {
    OpenWeatherMap(OpenWeatherMapClient),
    /// Constant probability, for sites without a forecast key.
    Fixed(f64),
    Disabled,
}

impl ForecastSource {
    pub fn from_config(config: &ForecastConfig) -> Result<Self> {
        if let Some(owm) = config.openweathermap.as_ref().filter(|c| c.enabled) {
            let timeout = Duration::from_secs(config.timeout_secs);
            return Ok(ForecastSource::OpenWeatherMap(OpenWeatherMapClient::new(
                owm.clone(),
                timeout,
            )?));
        }

        match config.fixed_probability {
            Some(p) if (0.0..=100.0).contains(&p) => Ok(ForecastSource::Fixed(p)),
            Some(p) => Err(IrrigoError::Config(format!(
                "forecast.fixed_probability {} outside [0, 100]",
                p
            ))),
            None => Ok(ForecastSource::Disabled),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ForecastSource::OpenWeatherMap(_) => "openweathermap",
            ForecastSource::Fixed(_) => "fixed",
            ForecastSource::Disabled => "disabled",
        }
    }
}

impl ForecastProvider for ForecastSource {
    async fn rain_forecast(&self) -> Result<RainForecast> {
        match self {
            ForecastSource::OpenWeatherMap(client) => client.fetch_rain_forecast().await,
            ForecastSource::Fixed(p) => Ok(RainForecast::new(*p, None)),
            ForecastSource::Disabled => Ok(RainForecast::neutral()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenWeatherMapConfig;

    #[test]
    fn source_selection() {
        let config = ForecastConfig::default();
        assert_eq!(ForecastSource::from_config(&config).unwrap().name(), "disabled");

        let config = ForecastConfig {
            fixed_probability: Some(35.0),
            ..ForecastConfig::default()
        };
        assert_eq!(ForecastSource::from_config(&config).unwrap().name(), "fixed");

        let config = ForecastConfig {
            openweathermap: Some(OpenWeatherMapConfig {
                api_key: "k".into(),
                latitude: 0.0,
                longitude: 0.0,
                enabled: false,
            }),
            fixed_probability: Some(35.0),
            ..ForecastConfig::default()
        };
        // Disabled key falls through to the fixed value
        assert_eq!(ForecastSource::from_config(&config).unwrap().name(), "fixed");
    }

    #[test]
    fn rejects_out_of_range_fixed_probability() {
        let config = ForecastConfig {
            fixed_probability: Some(140.0),
            ..ForecastConfig::default()
        };
        assert!(ForecastSource::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn fixed_and_disabled_forecasts() {
        let fixed = ForecastSource::Fixed(35.0).rain_forecast().await.unwrap();
        assert_eq!(fixed.probability, 35.0);
        let disabled = ForecastSource::Disabled.rain_forecast().await.unwrap();
        assert_eq!(disabled, RainForecast::neutral());
    }
}
