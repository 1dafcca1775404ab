//! Error types for the price_oracle crate

use oracle_math::MathError;
use thiserror::Error;

/// Custom error types for the price_oracle crate
#[derive(Debug, Error)]
pub enum OracleError {
    /// Error related to history data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error related to record or row validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid configuration values
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Forecasting was requested before any model was trained
    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    /// Unknown task kind requested of the run ledger
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// Unknown status requested of the run ledger
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Error from loading configuration
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Error from reading or writing delimited files
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Error from (de)serializing artifacts or ledger entries
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from fitting or evaluating models
    #[error("Math error: {0}")]
    MathError(#[from] MathError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, OracleError>;

impl From<csv::Error> for OracleError {
    fn from(err: csv::Error) -> Self {
        OracleError::CsvError(err.to_string())
    }
}

impl From<serde_json::Error> for OracleError {
    fn from(err: serde_json::Error) -> Self {
        OracleError::SerializationError(err.to_string())
    }
}

impl From<figment::Error> for OracleError {
    fn from(err: figment::Error) -> Self {
        OracleError::ConfigError(err.to_string())
    }
}
