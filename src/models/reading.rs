use crate::logic::fuzzy::CrispInputs;
use crate::logic::rules::variables;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A telemetry field exactly as the device sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Flag(bool),
    Text(String),
    Other(serde_json::Value),
}

impl RawValue {
    /// Numeric interpretation, if any. Numeric strings are accepted since
    /// some firmware sends `"25.3"` or `"nan"`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            RawValue::Text(s) => s.trim().parse::<f64>().ok(),
            RawValue::Flag(_) | RawValue::Other(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            RawValue::Number(n) => n.to_string(),
            RawValue::Flag(b) => b.to_string(),
            RawValue::Text(s) => format!("{:?}", s),
            RawValue::Other(v) => v.to_string(),
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// Unvalidated telemetry payload. Field names match the device firmware
/// (`Temperature`, `Soil_moisture`, ...) as well as snake_case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTelemetry {
    #[serde(default, alias = "Temperature")]
    pub temperature: Option<RawValue>,
    #[serde(default, alias = "Humidity")]
    pub humidity: Option<RawValue>,
    #[serde(default, alias = "Soil_moisture", alias = "SoilMoisture")]
    pub soil_moisture: Option<RawValue>,
    #[serde(default, alias = "Raining", alias = "is_raining")]
    pub raining: Option<RawValue>,
}

impl RawTelemetry {
    pub fn new(temperature: f64, humidity: f64, soil_moisture: f64, raining: bool) -> Self {
        Self {
            temperature: Some(RawValue::Number(temperature)),
            humidity: Some(RawValue::Number(humidity)),
            soil_moisture: Some(RawValue::Number(soil_moisture)),
            raining: Some(RawValue::Number(if raining { 1.0 } else { 0.0 })),
        }
    }
}

/// Validated sensor snapshot: every field usable by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub is_raining: bool,
    pub timestamp: DateTime<Utc>,
}

impl SensorReading {
    /// Crisp inputs for the irrigation control system.
    pub fn to_inputs(&self, rain_probability: f64) -> CrispInputs {
        let mut inputs = CrispInputs::new();
        inputs.insert(variables::TEMPERATURE.to_string(), self.temperature);
        inputs.insert(variables::HUMIDITY.to_string(), self.humidity);
        inputs.insert(variables::SOIL_MOISTURE.to_string(), self.soil_moisture);
        inputs.insert(
            variables::IS_RAINING.to_string(),
            if self.is_raining { 1.0 } else { 0.0 },
        );
        inputs.insert(variables::RAIN_PROBABILITY.to_string(), rain_probability);
        inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_firmware_field_names() {
        let raw: RawTelemetry = serde_json::from_str(
            r#"{"Temperature": 31.5, "Humidity": 40, "Soil_moisture": 22, "Raining": 0}"#,
        )
        .unwrap();
        assert_eq!(raw.temperature, Some(RawValue::Number(31.5)));
        assert_eq!(raw.humidity, Some(RawValue::Number(40.0)));
        assert_eq!(raw.soil_moisture, Some(RawValue::Number(22.0)));
        assert_eq!(raw.raining, Some(RawValue::Number(0.0)));
    }

    #[test]
    fn parses_snake_case_and_odd_values() {
        let raw: RawTelemetry = serde_json::from_str(
            r#"{"temperature": "nan", "humidity": null, "is_raining": true, "soil_moisture": [1]}"#,
        )
        .unwrap();
        assert_eq!(raw.temperature, Some(RawValue::Text("nan".into())));
        assert!(raw.temperature.unwrap().as_number().unwrap().is_nan());
        assert_eq!(raw.humidity, None);
        assert_eq!(raw.raining, Some(RawValue::Flag(true)));
        assert!(matches!(raw.soil_moisture, Some(RawValue::Other(_))));
    }

    #[test]
    fn missing_fields_default_to_none() {
        let raw: RawTelemetry = serde_json::from_str("{}").unwrap();
        assert_eq!(raw, RawTelemetry::default());
    }

    #[test]
    fn raw_value_numeric_text() {
        assert_eq!(RawValue::Text(" 25.5 ".into()).as_number(), Some(25.5));
        assert_eq!(RawValue::Text("warm".into()).as_number(), None);
        assert_eq!(RawValue::Flag(true).as_number(), None);
    }

    #[test]
    fn reading_to_inputs() {
        let reading = SensorReading {
            temperature: 30.0,
            humidity: 55.0,
            soil_moisture: 40.0,
            is_raining: true,
            timestamp: Utc::now(),
        };
        let inputs = reading.to_inputs(12.5);
        assert_eq!(inputs.len(), 5);
        assert_eq!(inputs[variables::IS_RAINING], 1.0);
        assert_eq!(inputs[variables::RAIN_PROBABILITY], 12.5);
    }
}
