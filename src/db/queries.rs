use crate::db::Database;
use crate::error::Result;
use crate::models::{DecisionRecord, PumpState, SensorReading};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use tracing::warn;

// Decision Queries

impl Database {
    pub fn insert_decision(&self, record: &DecisionRecord) -> Result<i64> {
        let anomalies = serde_json::to_string(&record.anomalies)?;

        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO decisions
                    (device_id, score, state, temperature, humidity, soil_moisture, is_raining,
                     reading_at, rain_probability, forecast_time, anomalies, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    record.device_id,
                    record.score,
                    record.state.as_str(),
                    record.reading.temperature,
                    record.reading.humidity,
                    record.reading.soil_moisture,
                    record.reading.is_raining,
                    record.reading.timestamp.to_rfc3339(),
                    record.rain_probability,
                    record.forecast_time.map(|t| t.to_rfc3339()),
                    anomalies,
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Most recent validated reading for `device_id`, or for any device if
    /// that one has no history yet.
    pub fn latest_reading(&self, device_id: &str) -> Result<Option<SensorReading>> {
        self.with_conn(|conn| {
            let own = conn
                .query_row(
                    "SELECT * FROM decisions WHERE device_id = ?1 ORDER BY id DESC LIMIT 1",
                    [device_id],
                    row_to_reading,
                )
                .optional()?;
            if own.is_some() {
                return Ok(own);
            }

            conn.query_row(
                "SELECT * FROM decisions ORDER BY id DESC LIMIT 1",
                [],
                row_to_reading,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Newest first.
    pub fn recent_decisions(
        &self,
        device_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<DecisionRecord>> {
        self.with_conn(|conn| {
            let limit = limit as i64;
            let records = match device_id {
                Some(device) => {
                    let mut stmt = conn.prepare(
                        "SELECT * FROM decisions WHERE device_id = ?1 ORDER BY id DESC LIMIT ?2",
                    )?;
                    let rows: Vec<DecisionRecord> = stmt
                        .query_map(params![device, limit], row_to_decision)?
                        .filter_map(|r| r.ok())
                        .collect();
                    rows
                }
                None => {
                    let mut stmt =
                        conn.prepare("SELECT * FROM decisions ORDER BY id DESC LIMIT ?1")?;
                    let rows: Vec<DecisionRecord> = stmt
                        .query_map([limit], row_to_decision)?
                        .filter_map(|r| r.ok())
                        .collect();
                    rows
                }
            };
            Ok(records)
        })
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn row_to_reading(row: &Row) -> rusqlite::Result<SensorReading> {
    let reading_at: String = row.get("reading_at")?;

    Ok(SensorReading {
        temperature: row.get("temperature")?,
        humidity: row.get("humidity")?,
        soil_moisture: row.get("soil_moisture")?,
        is_raining: row.get("is_raining")?,
        timestamp: parse_time(&reading_at).unwrap_or_else(Utc::now),
    })
}

fn row_to_decision(row: &Row) -> rusqlite::Result<DecisionRecord> {
    let state_str: String = row.get("state")?;
    let forecast_time: Option<String> = row.get("forecast_time")?;
    let anomalies_json: String = row.get("anomalies")?;
    let created_at: String = row.get("created_at")?;

    let state = PumpState::from_str(&state_str).unwrap_or_else(|| {
        warn!(state = %state_str, "Unknown pump state in database, defaulting to OFF");
        PumpState::Off
    });

    let anomalies = serde_json::from_str(&anomalies_json).unwrap_or_else(|e| {
        warn!("Unreadable anomaly list in database, ignoring: {}", e);
        Vec::new()
    });

    Ok(DecisionRecord {
        device_id: row.get("device_id")?,
        score: row.get("score")?,
        state,
        reading: row_to_reading(row)?,
        rain_probability: row.get("rain_probability")?,
        forecast_time: forecast_time.as_deref().and_then(parse_time),
        anomalies,
        created_at: parse_time(&created_at).unwrap_or_else(Utc::now),
    })
}

// Helper trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::validation::{AnomalyKind, FallbackSource, SensorAnomaly, SensorField};

    fn record(device: &str, temperature: f64, state: PumpState) -> DecisionRecord {
        DecisionRecord {
            device_id: device.to_string(),
            score: Some(70.0),
            state,
            reading: SensorReading {
                temperature,
                humidity: 55.0,
                soil_moisture: 30.0,
                is_raining: false,
                timestamp: Utc::now(),
            },
            rain_probability: 10.0,
            forecast_time: None,
            anomalies: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_and_read_back() {
        let db = Database::open_in_memory().unwrap();
        let mut rec = record("esp32-01", 31.0, PumpState::High);
        rec.anomalies.push(SensorAnomaly {
            field: SensorField::Temperature,
            kind: AnomalyKind::NotANumber,
            substituted: 28.0,
            source: FallbackSource::LastKnownGood,
        });
        rec.forecast_time = Some(Utc::now());
        db.insert_decision(&rec).unwrap();

        let rows = db.recent_decisions(None, 10).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.device_id, "esp32-01");
        assert_eq!(row.state, PumpState::High);
        assert_eq!(row.score, Some(70.0));
        assert_eq!(row.anomalies, rec.anomalies);
        assert!(row.forecast_time.is_some());
    }

    #[test]
    fn null_score_round_trips() {
        let db = Database::open_in_memory().unwrap();
        let mut rec = record("esp32-01", 31.0, PumpState::Off);
        rec.score = None;
        db.insert_decision(&rec).unwrap();
        assert!(db.recent_decisions(None, 1).unwrap()[0].no_rule_fired());
    }

    #[test]
    fn latest_reading_prefers_device() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.latest_reading("a").unwrap().is_none());

        db.insert_decision(&record("a", 20.0, PumpState::Low)).unwrap();
        db.insert_decision(&record("a", 21.0, PumpState::Low)).unwrap();
        db.insert_decision(&record("b", 35.0, PumpState::High)).unwrap();

        assert_eq!(db.latest_reading("a").unwrap().unwrap().temperature, 21.0);
        assert_eq!(db.latest_reading("b").unwrap().unwrap().temperature, 35.0);
        // Unknown device borrows the newest reading from anyone
        assert_eq!(db.latest_reading("c").unwrap().unwrap().temperature, 35.0);
    }

    #[test]
    fn recent_decisions_filter_and_limit() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.insert_decision(&record("a", 20.0 + i as f64, PumpState::Low))
                .unwrap();
        }
        db.insert_decision(&record("b", 30.0, PumpState::High)).unwrap();

        let rows = db.recent_decisions(Some("a"), 3).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].reading.temperature, 24.0);
        assert!(rows.iter().all(|r| r.device_id == "a"));
        assert_eq!(db.recent_decisions(None, 100).unwrap().len(), 6);
    }
}
