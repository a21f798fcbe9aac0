//! Incremental archive-merge engine for meteo grid data.
//!
//! Converted per-timestamp grid files are indexed by (month, parameter),
//! loaded in bounded batches, and merged into growing per-month Zarr
//! archives on object storage — create-on-first-commit, append with
//! timestamp de-duplication afterwards, bounded-retry commits throughout.

pub mod error;
pub mod index;
pub mod inspect;
pub mod loader;
pub mod merge;
pub mod query;

pub use error::{ArchiveError, Result};
pub use index::{index_directory, parse_grid_filename, GridRecord, MonthGroups};
pub use loader::{load_batch, BATCH_SIZE};
pub use merge::{ArchiveIdentity, MergeConfig, MergeEngine, MergeOutcome};
