//! Error types for the grid-store crate.

use thiserror::Error;

/// Errors that can occur reading or writing datasets.
#[derive(Error, Debug)]
pub enum GridStoreError {
    #[error("Failed to open store: {0}")]
    OpenFailed(String),

    #[error("Failed to read from store: {0}")]
    ReadFailed(String),

    #[error("Failed to write to store: {0}")]
    WriteFailed(String),

    #[error("Invalid store metadata: {0}")]
    InvalidMetadata(String),

    #[error("Dataset shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Dataset has no data variable")]
    MissingDataVariable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for grid-store operations.
pub type Result<T> = std::result::Result<T, GridStoreError>;
