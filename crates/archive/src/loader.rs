//! Batch loader for converted grid files.
//!
//! Opens a bounded batch of per-timestamp stores, normalizes each record
//! (canonical variable name, filename-derived time, step truncation), and
//! concatenates the survivors into one in-memory batch dataset.

use tracing::{debug, warn};

use grid_store::{local, Dataset, MAX_STEPS};

use crate::error::Result;
use crate::index::GridRecord;

/// Records per batch; batches are the unit of atomic commit attempt.
pub const BATCH_SIZE: usize = 10;

/// Load one batch of records into a single dataset.
///
/// Per-record failures are logged and skipped — a file that cannot be read
/// never aborts the batch. Records are concatenated in input order; callers
/// pre-sort by timestamp. Returns `Ok(None)` when no record yielded a usable
/// dataset, which callers treat as "no work this batch".
pub fn load_batch(records: &[GridRecord]) -> Result<Option<Dataset>> {
    let mut datasets = Vec::with_capacity(records.len());

    for record in records {
        let mut dataset = match local::read_local(&record.path) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(
                    path = %record.path.display(),
                    error = %e,
                    "Skipping unreadable converted file"
                );
                continue;
            }
        };

        // The first-declared data variable becomes the canonical parameter.
        dataset.rename(&record.parameter);

        // Filenames are the source of truth for temporal identity; the
        // content time axis is discarded.
        if let Err(e) = dataset.set_time(record.timestamp) {
            warn!(
                path = %record.path.display(),
                error = %e,
                "Skipping record with unusable time axis"
            );
            continue;
        }

        dataset.truncate_step(MAX_STEPS);
        datasets.push(dataset);
    }

    if datasets.is_empty() {
        debug!(records = records.len(), "No usable records in batch");
        return Ok(None);
    }

    let loaded = datasets.len();
    let combined = Dataset::concat_time(datasets)?;
    debug!(
        records = records.len(),
        loaded = loaded,
        shape = ?combined.shape(),
        "Loaded batch"
    );

    Ok(Some(combined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use grid_store::local::write_local;

    fn write_converted(
        dir: &std::path::Path,
        name: &str,
        steps: usize,
        base: f32,
    ) -> std::path::PathBuf {
        let path = dir.join(name);
        let dataset = Dataset {
            variable: "unknown_var".to_string(),
            data: (0..steps * 4).map(|i| base + i as f32).collect(),
            // Content time axis is deliberately wrong; the loader must
            // replace it with the filename-derived timestamp.
            time: vec![Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()],
            step: Some((0..steps as i64).collect()),
            latitude: vec![50.0, 49.5],
            longitude: vec![14.0, 14.5],
        };
        write_local(&path, &dataset).unwrap();
        path
    }

    fn record(path: std::path::PathBuf, hour: u32) -> GridRecord {
        GridRecord {
            path,
            timestamp: Utc.with_ymd_and_hms(2025, 4, 1, hour, 0, 0).unwrap(),
            parameter: "CLSTEMPERATURE".to_string(),
        }
    }

    #[test]
    fn test_load_batch_normalizes_records() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            record(
                write_converted(dir.path(), "2025040100_CLSTEMPERATURE.zarr", 3, 0.0),
                0,
            ),
            record(
                write_converted(dir.path(), "2025040106_CLSTEMPERATURE.zarr", 3, 100.0),
                6,
            ),
        ];

        let batch = load_batch(&records).unwrap().unwrap();

        assert_eq!(batch.variable, "CLSTEMPERATURE");
        assert_eq!(
            batch.time,
            vec![records[0].timestamp, records[1].timestamp]
        );
        assert_eq!(batch.shape(), vec![2, 3, 2, 2]);
    }

    #[test]
    fn test_load_batch_truncates_oversized_step() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record(
            write_converted(dir.path(), "2025040100_CLSTEMPERATURE.zarr", 80, 0.0),
            0,
        )];

        let batch = load_batch(&records).unwrap().unwrap();
        assert_eq!(batch.step.as_ref().unwrap().len(), MAX_STEPS);
    }

    #[test]
    fn test_load_batch_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = record(
            write_converted(dir.path(), "2025040100_CLSTEMPERATURE.zarr", 2, 0.0),
            0,
        );
        let missing = record(dir.path().join("2025040106_CLSTEMPERATURE.zarr"), 6);

        let batch = load_batch(&[good.clone(), missing]).unwrap().unwrap();
        assert_eq!(batch.time, vec![good.timestamp]);
    }

    #[test]
    fn test_load_batch_empty_when_nothing_readable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = record(dir.path().join("2025040106_CLSTEMPERATURE.zarr"), 6);

        assert!(load_batch(&[missing]).unwrap().is_none());
    }
}
