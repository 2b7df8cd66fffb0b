//! Error types for Tabula

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Degenerate training set: {0}")]
    DegenerateTrainingSet(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Shorthand for an `InvalidConfiguration` error
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }

    /// Shorthand for a `MissingColumn` error
    pub(crate) fn missing(column: impl Into<String>) -> Self {
        Error::MissingColumn(column.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
