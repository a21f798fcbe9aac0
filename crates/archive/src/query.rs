//! Read-only range queries over the archive layout.
//!
//! Loads one parameter across a time window that may span several monthly
//! archives, concatenates along time, and optionally slices a geographic
//! window. Consumes the same storage layout the merge engine produces.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use grid_store::{ArchiveStore, Dataset};
use meteo_common::{BoundingBox, MonthKey};
use storage::{ObjectStorage, StoragePath};

use crate::error::Result;

/// Load `parameter` over `[start, end]`, optionally restricted to `bbox`.
///
/// Months without an archive are skipped; a month that exists but cannot be
/// opened is logged and skipped rather than failing the whole query.
/// Returns `Ok(None)` when no archive contributed any data.
pub async fn load_range(
    storage: &ObjectStorage,
    parameter: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bbox: Option<&BoundingBox>,
) -> Result<Option<Dataset>> {
    let months = MonthKey::spanning(start, end);
    debug!(
        parameter = parameter,
        months = months.len(),
        "Resolving months for query window"
    );

    let mut datasets = Vec::new();
    for month in months {
        let prefix = StoragePath::archive_store(month, parameter);

        if !storage.exists_prefix(&prefix).await? {
            debug!(archive = %prefix, "No archive for month, skipping");
            continue;
        }

        let store = ArchiveStore::new(storage.store(), &prefix);
        match store.open() {
            Ok(dataset) => {
                info!(
                    archive = %prefix,
                    records = dataset.time.len(),
                    "Loaded monthly archive"
                );
                datasets.push(dataset);
            }
            Err(e) => {
                warn!(archive = %prefix, error = %e, "Failed to open monthly archive");
            }
        }
    }

    if datasets.is_empty() {
        return Ok(None);
    }

    let combined = Dataset::concat_time(datasets)?;
    let mut result = combined.select_time_range(start, end);
    if let Some(bbox) = bbox {
        result = result.select_bbox(bbox);
    }

    if result.is_empty() {
        return Ok(None);
    }
    Ok(Some(result))
}
