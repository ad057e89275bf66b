use super::reading::SensorReading;
use crate::logic::validation::SensorAnomaly;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete actuation command sent to a device.
///
/// `Low` and `On` share level 1: the binary policy's ON and the three-tier
/// policy's LOW are the same command on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpState {
    Off,
    Low,
    High,
    On,
}

impl PumpState {
    pub fn level(&self) -> u8 {
        match self {
            PumpState::Off => 0,
            PumpState::Low | PumpState::On => 1,
            PumpState::High => 2,
        }
    }

    /// Command token published to the device ("0" / "1" / "2").
    pub fn token(&self) -> String {
        self.level().to_string()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PumpState::Off => "OFF",
            PumpState::Low => "LOW",
            PumpState::High => "HIGH",
            PumpState::On => "ON",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "off" => Some(PumpState::Off),
            "low" => Some(PumpState::Low),
            "high" => Some(PumpState::High),
            "on" => Some(PumpState::On),
            _ => None,
        }
    }
}

impl std::fmt::Display for PumpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.as_str(), self.level())
    }
}

/// One decision cycle's outcome, handed to the history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub device_id: String,
    /// Defuzzified score; `None` when no rule fired.
    pub score: Option<f64>,
    pub state: PumpState,
    pub reading: SensorReading,
    pub rain_probability: f64,
    pub forecast_time: Option<DateTime<Utc>>,
    pub anomalies: Vec<SensorAnomaly>,
    pub created_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn no_rule_fired(&self) -> bool {
        self.score.is_none()
    }
}
