mod connection;
mod migrations;
mod queries;

pub use connection::Database;

use crate::error::Result;
use crate::models::{DecisionRecord, SensorReading};
use std::sync::{Mutex, PoisonError};

/// Decision history used by the controller.
pub trait DecisionStore: Send + Sync {
    fn record_decision(&self, record: &DecisionRecord) -> Result<()>;

    /// Last known reading to seed a device's fallback cache on cold start.
    fn last_reading(&self, device_id: &str) -> Result<Option<SensorReading>>;
}

impl DecisionStore for Database {
    fn record_decision(&self, record: &DecisionRecord) -> Result<()> {
        self.insert_decision(record).map(|_| ())
    }

    fn last_reading(&self, device_id: &str) -> Result<Option<SensorReading>> {
        self.latest_reading(device_id)
    }
}

/// Non-persistent history, for `storage.persist: false`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<DecisionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DecisionStore for MemoryStore {
    fn record_decision(&self, record: &DecisionRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    fn last_reading(&self, device_id: &str) -> Result<Option<SensorReading>> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let own = records.iter().rev().find(|r| r.device_id == device_id);
        Ok(own.or_else(|| records.last()).map(|r| r.reading))
    }
}

impl<T: DecisionStore> DecisionStore for std::sync::Arc<T> {
    fn record_decision(&self, record: &DecisionRecord) -> Result<()> {
        (**self).record_decision(record)
    }

    fn last_reading(&self, device_id: &str) -> Result<Option<SensorReading>> {
        (**self).last_reading(device_id)
    }
}

impl DecisionStore for Box<dyn DecisionStore> {
    fn record_decision(&self, record: &DecisionRecord) -> Result<()> {
        (**self).record_decision(record)
    }

    fn last_reading(&self, device_id: &str) -> Result<Option<SensorReading>> {
        (**self).last_reading(device_id)
    }
}
