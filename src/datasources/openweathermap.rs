use super::ForecastProvider;
use crate::config::OpenWeatherMapConfig;
use crate::error::{IrrigoError, Result};
use crate::models::RainForecast;
use chrono::DateTime;
use serde::Deserialize;
use std::time::Duration;

const API_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

pub struct OpenWeatherMapClient {
    client: reqwest::Client,
    config: OpenWeatherMapConfig,
    base_url: String,
}

// OpenWeatherMap API response structures
#[derive(Debug, Deserialize)]
struct OwmForecastResponse {
    list: Vec<OwmForecastItem>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastItem {
    dt: i64,
    #[serde(default)]
    pop: f64, // probability of precipitation
}

impl OpenWeatherMapClient {
    pub fn new(config: OpenWeatherMapConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IrrigoError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            base_url: API_BASE_URL.to_string(),
        })
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Probability of rain for the first 3-hour forecast block.
    pub async fn fetch_rain_forecast(&self) -> Result<RainForecast> {
        let url = format!(
            "{}/forecast?lat={}&lon={}&appid={}&units=metric",
            self.base_url, self.config.latitude, self.config.longitude, self.config.api_key
        );

        let response =
            self.client.get(&url).send().await.map_err(|e| {
                IrrigoError::DataSourceUnavailable(format!("OpenWeatherMap: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IrrigoError::DataSourceUnavailable(format!(
                "OpenWeatherMap returned {}: {}",
                status, body
            )));
        }

        let body = response.text().await.map_err(|e| {
            IrrigoError::DataSourceUnavailable(format!("OpenWeatherMap: {}", e))
        })?;

        parse_rain_forecast(&body)
    }

    /// Test connection to OpenWeatherMap API
    pub async fn test_connection(&self) -> Result<bool> {
        let url = format!(
            "{}/weather?lat={}&lon={}&appid={}&units=metric",
            self.base_url, self.config.latitude, self.config.longitude, self.config.api_key
        );

        let response =
            self.client.get(&url).send().await.map_err(|e| {
                IrrigoError::DataSourceUnavailable(format!("OpenWeatherMap: {}", e))
            })?;

        Ok(response.status().is_success())
    }
}

impl ForecastProvider for OpenWeatherMapClient {
    async fn rain_forecast(&self) -> Result<RainForecast> {
        self.fetch_rain_forecast().await
    }
}

fn parse_rain_forecast(body: &str) -> Result<RainForecast> {
    let response: OwmForecastResponse = serde_json::from_str(body).map_err(|e| {
        IrrigoError::DataSourceUnavailable(format!(
            "Failed to parse OpenWeatherMap response: {}",
            e
        ))
    })?;

    let first = response.list.first().ok_or_else(|| {
        IrrigoError::DataSourceUnavailable("OpenWeatherMap returned no forecast blocks".into())
    })?;

    Ok(RainForecast::from_pop(
        first.pop,
        DateTime::from_timestamp(first.dt, 0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> OpenWeatherMapConfig {
        OpenWeatherMapConfig {
            api_key: "test_key".to_string(),
            latitude: 5.4164,
            longitude: 100.3327,
            enabled: true,
        }
    }

    #[test]
    fn client_creation() {
        let client = OpenWeatherMapClient::new(sample_config(), Duration::from_secs(5)).unwrap();
        assert!(client.config.enabled);
        assert_eq!(client.base_url, API_BASE_URL);
    }

    #[test]
    fn parses_first_block() {
        let body = r#"{
            "cod": "200",
            "list": [
                {"dt": 1700000000, "main": {"temp": 29.1}, "pop": 0.42},
                {"dt": 1700010800, "main": {"temp": 28.0}, "pop": 0.9}
            ],
            "city": {"name": "George Town"}
        }"#;
        let forecast = parse_rain_forecast(body).unwrap();
        assert!((forecast.probability - 42.0).abs() < 1e-9);
        assert_eq!(
            forecast.forecast_time.map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn missing_pop_is_zero() {
        let forecast = parse_rain_forecast(r#"{"list": [{"dt": 1700000000}]}"#).unwrap();
        assert_eq!(forecast.probability, 0.0);
    }

    #[test]
    fn empty_list_is_unavailable() {
        assert!(matches!(
            parse_rain_forecast(r#"{"list": []}"#),
            Err(IrrigoError::DataSourceUnavailable(_))
        ));
        assert!(parse_rain_forecast("not json").is_err());
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        let client = OpenWeatherMapClient::new(sample_config(), Duration::from_millis(200))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        assert!(matches!(
            client.fetch_rain_forecast().await,
            Err(IrrigoError::DataSourceUnavailable(_))
        ));
    }
}
