use crate::config::{FieldLimits, ValidationConfig};
use crate::models::{RawTelemetry, RawValue, SensorReading};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorField {
    Temperature,
    Humidity,
    SoilMoisture,
    Raining,
}

impl SensorField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorField::Temperature => "temperature",
            SensorField::Humidity => "humidity",
            SensorField::SoilMoisture => "soil_moisture",
            SensorField::Raining => "raining",
        }
    }
}

impl std::fmt::Display for SensorField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyKind {
    Missing,
    NotNumeric { raw: String },
    NotANumber,
    OutOfRange { value: f64, min: f64, max: f64 },
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyKind::Missing => write!(f, "missing"),
            AnomalyKind::NotNumeric { raw } => write!(f, "invalid value {}", raw),
            AnomalyKind::NotANumber => write!(f, "NaN"),
            AnomalyKind::OutOfRange { value, min, max } => {
                write!(f, "value {} out of range [{}, {}]", value, min, max)
            }
        }
    }
}

/// Where a substituted value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackSource {
    LastKnownGood,
    Default,
}

/// An invalid reading and the value used in its place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorAnomaly {
    pub field: SensorField,
    pub kind: AnomalyKind,
    pub substituted: f64,
    pub source: FallbackSource,
}

impl std::fmt::Display for SensorAnomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match self.source {
            FallbackSource::LastKnownGood => "last known good",
            FallbackSource::Default => "default",
        };
        write!(
            f,
            "{}: {}, using {} {}",
            self.field, self.kind, source, self.substituted
        )
    }
}

/// Observability hook for sensor anomalies.
pub trait AnomalySink: Send + Sync {
    fn report(&self, device_id: &str, anomaly: &SensorAnomaly);
}

/// Logs each anomaly as a `tracing` warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnomalySink;

impl AnomalySink for TracingAnomalySink {
    fn report(&self, device_id: &str, anomaly: &SensorAnomaly) {
        tracing::warn!(
            device = %device_id,
            field = %anomaly.field,
            substituted = anomaly.substituted,
            "Sensor anomaly: {}",
            anomaly
        );
    }
}

/// Last validated temperature and humidity for one device.
///
/// Soil moisture and the rain flag are deliberately not cached: on an
/// invalid reading they always fall back to their static defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FallbackCache {
    pub last_temperature: Option<f64>,
    pub last_humidity: Option<f64>,
}

impl FallbackCache {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn seeded(temperature: Option<f64>, humidity: Option<f64>) -> Self {
        Self {
            last_temperature: temperature,
            last_humidity: humidity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last_temperature.is_none() && self.last_humidity.is_none()
    }
}

/// Check one numeric field. Never fails: returns the value to use and the
/// anomaly, if any.
pub fn validate(
    raw: Option<&RawValue>,
    fallback: f64,
    min: f64,
    max: f64,
) -> (f64, Option<AnomalyKind>) {
    let raw = match raw {
        Some(raw) => raw,
        None => return (fallback, Some(AnomalyKind::Missing)),
    };

    match raw.as_number() {
        None => (
            fallback,
            Some(AnomalyKind::NotNumeric {
                raw: raw.describe(),
            }),
        ),
        Some(value) if value.is_nan() => (fallback, Some(AnomalyKind::NotANumber)),
        Some(value) if value < min || value > max => {
            (fallback, Some(AnomalyKind::OutOfRange { value, min, max }))
        }
        Some(value) => (value, None),
    }
}

/// Accepts 0/1, true/false and their string forms.
fn validate_flag(raw: Option<&RawValue>, fallback: bool) -> (bool, Option<AnomalyKind>) {
    let raw = match raw {
        Some(raw) => raw,
        None => return (fallback, Some(AnomalyKind::Missing)),
    };

    let parsed = match raw {
        RawValue::Flag(b) => Some(*b),
        RawValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        RawValue::Number(n) if *n == 1.0 => Some(true),
        RawValue::Number(n) if *n == 0.0 => Some(false),
        _ => None,
    };

    match parsed {
        Some(flag) => (flag, None),
        None => (
            fallback,
            Some(AnomalyKind::NotNumeric {
                raw: raw.describe(),
            }),
        ),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReading {
    pub reading: SensorReading,
    pub anomalies: Vec<SensorAnomaly>,
}

/// Repairs raw telemetry before it reaches the engine.
#[derive(Debug, Clone, Default)]
pub struct SensorValidator {
    config: ValidationConfig,
}

impl SensorValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate every field, reading and updating `cache` for temperature
    /// and humidity.
    pub fn validate(&self, raw: &RawTelemetry, cache: &mut FallbackCache) -> ValidatedReading {
        let mut anomalies = Vec::new();

        let temperature = cached_field(
            SensorField::Temperature,
            raw.temperature.as_ref(),
            &self.config.temperature,
            &mut cache.last_temperature,
            &mut anomalies,
        );
        let humidity = cached_field(
            SensorField::Humidity,
            raw.humidity.as_ref(),
            &self.config.humidity,
            &mut cache.last_humidity,
            &mut anomalies,
        );

        let limits = &self.config.soil_moisture;
        let (soil_moisture, kind) =
            validate(raw.soil_moisture.as_ref(), limits.default, limits.min, limits.max);
        if let Some(kind) = kind {
            anomalies.push(SensorAnomaly {
                field: SensorField::SoilMoisture,
                kind,
                substituted: soil_moisture,
                source: FallbackSource::Default,
            });
        }

        let (is_raining, kind) = validate_flag(raw.raining.as_ref(), self.config.raining_default);
        if let Some(kind) = kind {
            anomalies.push(SensorAnomaly {
                field: SensorField::Raining,
                kind,
                substituted: if is_raining { 1.0 } else { 0.0 },
                source: FallbackSource::Default,
            });
        }

        ValidatedReading {
            reading: SensorReading {
                temperature,
                humidity,
                soil_moisture,
                is_raining,
                timestamp: Utc::now(),
            },
            anomalies,
        }
    }
}

fn cached_field(
    field: SensorField,
    raw: Option<&RawValue>,
    limits: &FieldLimits,
    last: &mut Option<f64>,
    anomalies: &mut Vec<SensorAnomaly>,
) -> f64 {
    let (fallback, source) = match *last {
        Some(value) => (value, FallbackSource::LastKnownGood),
        None => (limits.default, FallbackSource::Default),
    };

    let (value, kind) = validate(raw, fallback, limits.min, limits.max);
    match kind {
        Some(kind) => anomalies.push(SensorAnomaly {
            field,
            kind,
            substituted: value,
            source,
        }),
        None => *last = Some(value),
    }
    value
}
