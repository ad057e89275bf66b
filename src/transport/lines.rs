use super::{
    parse_telemetry_topic, CommandSink, Envelope, TelemetryMessage, TelemetrySource,
};
use crate::error::{IrrigoError, Result};
use crate::models::{PumpState, RawTelemetry};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Reads one JSON envelope per line.
///
/// A line without a `topic` is treated as a bare telemetry object from the
/// default device, the way a serial-attached sensor board reports. Lines that
/// are not UTF-8 or not JSON are skipped.
pub struct LineTransport<R> {
    reader: R,
    line: Vec<u8>,
    default_device: String,
    special_floats: regex_lite::Regex,
}

impl<R> LineTransport<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R, default_device: &str) -> Result<Self> {
        // Firmware serializes a failed float read as a bare NaN, which is not JSON
        let special_floats =
            regex_lite::Regex::new(r#":\s*(-?(?:NaN|nan|Infinity|inf))\s*([,}\]])"#)
                .map_err(|e| IrrigoError::Transport(format!("Bad float pattern: {}", e)))?;

        Ok(Self {
            reader,
            line: Vec::new(),
            default_device: default_device.to_string(),
            special_floats,
        })
    }

    fn sanitize(&self, line: &str) -> String {
        self.special_floats
            .replace_all(line, r#":"${1}"${2}"#)
            .into_owned()
    }

    /// Parse as-is first so float tokens inside string values are left alone.
    fn parse_json<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        match serde_json::from_str(text) {
            Ok(value) => Ok(value),
            Err(_) => Ok(serde_json::from_str(&self.sanitize(text))?),
        }
    }

    fn parse_line(&self, line: &str) -> Result<TelemetryMessage> {
        let value: serde_json::Value = self.parse_json(line)?;

        let topic = value.get("topic").and_then(|t| t.as_str());
        let Some(topic) = topic else {
            return Ok(TelemetryMessage {
                device_id: self.default_device.clone(),
                telemetry: serde_json::from_value(value)?,
            });
        };

        let device_id = parse_telemetry_topic(topic)
            .ok_or_else(|| IrrigoError::Transport(format!("Not a telemetry topic: {}", topic)))?
            .to_string();

        let envelope: Envelope = serde_json::from_value(value)?;
        let telemetry = match envelope.payload {
            // MQTT bridges forward the raw payload bytes as a string
            serde_json::Value::String(payload) => self.parse_json::<RawTelemetry>(&payload)?,
            payload => serde_json::from_value(payload)?,
        };

        Ok(TelemetryMessage {
            device_id,
            telemetry,
        })
    }
}

impl<R> TelemetrySource for LineTransport<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_message(&mut self) -> Result<Option<TelemetryMessage>> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line).await? == 0 {
                return Ok(None);
            }

            // Line noise on a serial link shows up as invalid UTF-8
            let Ok(line) = std::str::from_utf8(&self.line) else {
                tracing::warn!(bytes = self.line.len(), "Skipping non-UTF-8 telemetry line");
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match self.parse_line(line) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => tracing::warn!("Skipping unreadable telemetry line: {}", e),
            }
        }
    }
}

/// Writes one command envelope per line.
pub struct JsonLineSink<W> {
    writer: W,
}

impl<W> JsonLineSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> CommandSink for JsonLineSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish(&mut self, device_id: &str, state: PumpState) -> Result<()> {
        let mut line = serde_json::to_vec(&Envelope::command(device_id, state))?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
