//! Device messaging: telemetry in on `device/<id>/telemetry`, commands out on
//! `device/<id>/command`.

pub mod lines;

pub use lines::{JsonLineSink, LineTransport};

use crate::error::Result;
use crate::models::{PumpState, RawTelemetry};
use serde::{Deserialize, Serialize};
use std::future::Future;

pub const TOPIC_PREFIX: &str = "device";
pub const TELEMETRY_SUFFIX: &str = "telemetry";
pub const COMMAND_SUFFIX: &str = "command";

/// Device id from a `device/<id>/telemetry` topic.
pub fn parse_telemetry_topic(topic: &str) -> Option<&str> {
    let mut parts = topic.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(TOPIC_PREFIX), Some(id), Some(TELEMETRY_SUFFIX), None) if !id.is_empty() => Some(id),
        _ => None,
    }
}

pub fn command_topic(device_id: &str) -> String {
    format!("{}/{}/{}", TOPIC_PREFIX, device_id, COMMAND_SUFFIX)
}

/// One line on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn command(device_id: &str, state: PumpState) -> Self {
        Self {
            topic: command_topic(device_id),
            payload: serde_json::Value::String(state.token()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryMessage {
    pub device_id: String,
    pub telemetry: RawTelemetry,
}

pub trait TelemetrySource: Send {
    /// Next telemetry message, or `None` once the stream has ended.
    fn next_message(&mut self) -> impl Future<Output = Result<Option<TelemetryMessage>>> + Send;
}

pub trait CommandSink: Send {
    fn publish(
        &mut self,
        device_id: &str,
        state: PumpState,
    ) -> impl Future<Output = Result<()>> + Send;
}
