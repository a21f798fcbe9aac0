//! Error types for the archive crate.

use thiserror::Error;

/// Errors that can occur while indexing, loading, or merging.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Transient storage failure (probe, list, read) — retried where the
    /// operation allows it, surfaced otherwise.
    #[error("Storage error: {0}")]
    Storage(#[from] meteo_common::MeteoError),

    /// Dataset read/write or shape problem.
    #[error("Dataset error: {0}")]
    Dataset(#[from] grid_store::GridStoreError),

    /// Commit gave up after the bounded number of attempts.
    #[error("Commit failed after {attempts} attempts: {message}")]
    CommitExhausted { attempts: u32, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
