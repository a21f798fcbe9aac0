//! Chunked array datasets for meteo-archive.
//!
//! An in-memory [`Dataset`] models one parameter over
//! `time x step x latitude x longitude`, backed by Zarr V3 stores:
//! local converted files ([`local`]) and remote per-month archives
//! ([`archive`]).

pub mod archive;
pub mod dataset;
pub mod error;
pub mod local;
mod schema;
mod zarr_io;

pub use archive::{ArchiveStore, CommitMode};
pub use dataset::{ChunkSpec, Dataset, MAX_STEPS};
pub use error::{GridStoreError, Result};
