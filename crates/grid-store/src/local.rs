//! Local Zarr V3 stores for converted grid files.
//!
//! The conversion collaborator writes each decoded GRIB file as a
//! single-record store on the local filesystem; the batch loader reads them
//! back as [`Dataset`]s.

use std::path::Path;
use std::sync::Arc;

use serde_json::Map;
use zarrs::array::{DataType, FillValue};
use zarrs::group::Group;
use zarrs_filesystem::FilesystemStore;

use crate::dataset::{ChunkSpec, Dataset};
use crate::error::{GridStoreError, Result};
use crate::schema;
use crate::zarr_io::{read_array, store_group_attrs, write_array, ArraySpec};

fn open_store(path: &Path) -> Result<Arc<FilesystemStore>> {
    FilesystemStore::new(path)
        .map(Arc::new)
        .map_err(|e| GridStoreError::OpenFailed(e.to_string()))
}

/// Write a dataset as a local Zarr store rooted at `path`.
pub fn write_local(path: &Path, dataset: &Dataset) -> Result<()> {
    dataset.validate()?;

    std::fs::create_dir_all(path)?;
    let store = open_store(path)?;

    let spec = ChunkSpec::bounded(dataset);
    let dims: Vec<String> = dataset.dim_names();
    let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();

    // Root group carries the variable listing and structure summary.
    store_group_attrs(
        store.clone(),
        "/",
        schema::group_attrs(dataset, dataset.time.len() as u64),
    )?;

    write_array(
        store.clone(),
        &format!("/{}", dataset.variable),
        ArraySpec {
            shape: dataset.shape(),
            chunk_shape: schema::data_chunk_shape(dataset, spec),
            data_type: DataType::Float32,
            fill_value: FillValue::from(f32::NAN),
            dims: &dim_refs,
            attrs: Map::new(),
            compress: true,
        },
        &dataset.data,
    )?;

    let times: Vec<i64> = dataset.time.iter().map(|t| schema::epoch_seconds(*t)).collect();
    write_array(
        store.clone(),
        "/time",
        ArraySpec {
            shape: vec![times.len() as u64],
            chunk_shape: vec![spec.time],
            data_type: DataType::Int64,
            fill_value: FillValue::from(0i64),
            dims: &["time"],
            attrs: schema::time_attrs(),
            compress: false,
        },
        &times,
    )?;

    if let Some(step) = &dataset.step {
        write_array(
            store.clone(),
            "/step",
            ArraySpec {
                shape: vec![step.len() as u64],
                chunk_shape: vec![step.len().max(1) as u64],
                data_type: DataType::Int64,
                fill_value: FillValue::from(0i64),
                dims: &["step"],
                attrs: schema::step_attrs(),
                compress: false,
            },
            step,
        )?;
    }

    write_array(
        store.clone(),
        "/latitude",
        ArraySpec {
            shape: vec![dataset.latitude.len() as u64],
            chunk_shape: vec![dataset.latitude.len().max(1) as u64],
            data_type: DataType::Float64,
            fill_value: FillValue::from(f64::NAN),
            dims: &["latitude"],
            attrs: Map::new(),
            compress: false,
        },
        &dataset.latitude,
    )?;
    write_array(
        store,
        "/longitude",
        ArraySpec {
            shape: vec![dataset.longitude.len() as u64],
            chunk_shape: vec![dataset.longitude.len().max(1) as u64],
            data_type: DataType::Float64,
            fill_value: FillValue::from(f64::NAN),
            dims: &["longitude"],
            attrs: Map::new(),
            compress: false,
        },
        &dataset.longitude,
    )?;

    Ok(())
}

/// Read a local Zarr store back into a dataset.
///
/// The primary data variable is the first entry of the group's variable
/// listing, matching how it was declared on write.
pub fn read_local(path: &Path) -> Result<Dataset> {
    let store = open_store(path)?;

    let group = Group::open(store.clone(), "/")
        .map_err(|e| GridStoreError::OpenFailed(e.to_string()))?;
    let attrs = group.attributes();

    let variable = schema::primary_variable(attrs)?;
    let has_step = schema::has_step(attrs);

    let data: Vec<f32> = read_array(store.clone(), &format!("/{}", variable))?;
    let time_secs: Vec<i64> = read_array(store.clone(), "/time")?;
    let time = time_secs
        .into_iter()
        .map(schema::from_epoch_seconds)
        .collect::<Result<Vec<_>>>()?;
    let step = if has_step {
        Some(read_array(store.clone(), "/step")?)
    } else {
        None
    };
    let latitude: Vec<f64> = read_array(store.clone(), "/latitude")?;
    let longitude: Vec<f64> = read_array(store, "/longitude")?;

    let dataset = Dataset {
        variable,
        data,
        time,
        step,
        latitude,
        longitude,
    };
    dataset.validate()?;
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_dataset() -> Dataset {
        Dataset {
            variable: "CLSTEMPERATURE".to_string(),
            data: (0..24).map(|i| i as f32).collect(),
            time: vec![chrono::Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()],
            step: Some(vec![0, 1, 2, 3, 4, 5]),
            latitude: vec![50.0, 49.5],
            longitude: vec![14.0, 14.5],
        }
    }

    #[test]
    fn test_local_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2025040100_CLSTEMPERATURE.zarr");

        let dataset = sample_dataset();
        write_local(&path, &dataset).unwrap();

        let restored = read_local(&path).unwrap();
        assert_eq!(restored.variable, dataset.variable);
        assert_eq!(restored.time, dataset.time);
        assert_eq!(restored.step, dataset.step);
        assert_eq!(restored.data, dataset.data);
    }

    #[test]
    fn test_read_missing_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.zarr");
        assert!(read_local(&path).is_err());
    }
}
