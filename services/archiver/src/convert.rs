//! GRIB to Zarr conversion collaborator.
//!
//! Decodes each raw grid file with the `grib` crate and writes a local
//! single-record Zarr store alongside it (same stem, `.zarr` extension),
//! ready for the batch loader. Grid geometry comes from the model
//! configuration; payloads that do not match it are rejected.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info, warn};

use archive::{index::scan_files, parse_grid_filename};
use grid_store::{local, Dataset};

use crate::config::GridConfig;

/// Convert one GRIB file into a local Zarr store.
///
/// Each submessage is one forecast step of the single parameter the file
/// carries; submessage order is the forecast lead sequence.
pub fn convert_grib(path: &Path, grid: &GridConfig) -> Result<PathBuf> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid filename: {}", path.display()))?;

    let (timestamp, parameter) = parse_grid_filename(filename)
        .ok_or_else(|| anyhow!("Filename does not carry a grid identity: {}", filename))?;

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let grib_file = grib::from_reader(reader)
        .map_err(|e| anyhow!("Failed to parse GRIB file {}: {:?}", path.display(), e))?;

    let plane = grid.nx * grid.ny;
    let mut data = Vec::new();
    let mut steps: Vec<i64> = Vec::new();

    for (idx, (_msg_idx, submsg)) in grib_file.iter().enumerate() {
        let decoder = grib::Grib2SubmessageDecoder::from(submsg)
            .map_err(|e| anyhow!("Failed to create decoder for step {}: {:?}", idx, e))?;
        let values: Vec<f32> = decoder
            .dispatch()
            .map_err(|e| anyhow!("Failed to decode step {}: {:?}", idx, e))?
            .collect();

        if values.len() != plane {
            bail!(
                "Step {} has {} values, grid expects {} ({}x{})",
                idx,
                values.len(),
                plane,
                grid.nx,
                grid.ny
            );
        }

        data.extend_from_slice(&values);
        steps.push(idx as i64);
    }

    if steps.is_empty() {
        bail!("No decodable submessages in {}", path.display());
    }

    let dataset = Dataset {
        variable: parameter,
        data,
        time: vec![timestamp],
        step: Some(steps),
        latitude: axis(grid.bbox.max_lat, grid.bbox.min_lat, grid.ny),
        longitude: axis(grid.bbox.min_lon, grid.bbox.max_lon, grid.nx),
    };

    let output = path.with_extension("zarr");
    local::write_local(&output, &dataset)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    debug!(
        path = %output.display(),
        steps = dataset.step.as_ref().map(Vec::len).unwrap_or(0),
        "Converted grid file"
    );
    Ok(output)
}

/// Evenly spaced coordinate axis from `first` to `last` inclusive.
/// Latitudes run north to south, so `first` may exceed `last`.
fn axis(first: f64, last: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![first];
    }
    let span = (last - first) / (n - 1) as f64;
    (0..n).map(|i| first + span * i as f64).collect()
}

/// Convert every raw grid file under `root`.
///
/// Per-file failures are logged and skipped; returns the number of files
/// converted.
pub fn convert_all(root: &Path, extension: &str, grid: &GridConfig) -> usize {
    let mut converted = 0;

    for path in scan_files(root, extension) {
        match convert_grib(&path, grid) {
            Ok(_) => converted += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unconvertible grid file");
            }
        }
    }

    info!(converted = converted, "Conversion pass complete");
    converted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_descending_latitudes() {
        let lats = axis(52.0, 46.0, 4);
        assert_eq!(lats, vec![52.0, 50.0, 48.0, 46.0]);
    }

    #[test]
    fn test_axis_single_point() {
        assert_eq!(axis(10.0, 20.0, 1), vec![10.0]);
    }

    #[test]
    fn test_convert_rejects_non_grid_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notagrid.grb");
        std::fs::write(&path, b"junk").unwrap();

        let grid = GridConfig {
            nx: 2,
            ny: 2,
            bbox: crate::config::BBox {
                min_lon: 14.0,
                min_lat: 49.0,
                max_lon: 15.0,
                max_lat: 50.0,
            },
        };
        assert!(convert_grib(&path, &grid).is_err());
    }

    #[test]
    fn test_convert_rejects_corrupt_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2025040100_CLSTEMPERATURE.grb");
        std::fs::write(&path, b"not a grib file").unwrap();

        let grid = GridConfig {
            nx: 2,
            ny: 2,
            bbox: crate::config::BBox {
                min_lon: 14.0,
                min_lat: 49.0,
                max_lon: 15.0,
                max_lat: 50.0,
            },
        };
        assert!(convert_grib(&path, &grid).is_err());
    }
}
