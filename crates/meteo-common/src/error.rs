//! Error types shared across the meteo-archive crates.

use thiserror::Error;

/// Result type alias using MeteoError.
pub type MeteoResult<T> = Result<T, MeteoError>;

/// Primary error type for archive operations.
#[derive(Debug, Error)]
pub enum MeteoError {
    // === Storage Errors ===
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    // === Data Errors ===
    #[error("Failed to read dataset: {0}")]
    DataReadError(String),

    #[error("Invalid GRIB data: {0}")]
    GribError(String),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    // === Time Errors ===
    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Invalid month key: {0}")]
    InvalidMonthKey(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    InternalError(String),
}

// Conversion from common error types
impl From<std::io::Error> for MeteoError {
    fn from(err: std::io::Error) -> Self {
        MeteoError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for MeteoError {
    fn from(err: serde_json::Error) -> Self {
        MeteoError::InternalError(format!("JSON error: {}", err))
    }
}
