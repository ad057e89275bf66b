use crate::logic::decision::PolicyError;
use crate::logic::fuzzy::FuzzyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IrrigoError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Fuzzy engine error: {0}")]
    Fuzzy(#[from] FuzzyError),

    #[error("Decision policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, IrrigoError>;
