//! Remote per-month archive stores on object storage.
//!
//! An archive is a Zarr V3 group at `meteo_data/{month}/{parameter}.zarr`
//! holding one data variable plus coordinate arrays. Supports creation from
//! a first batch, appending along `time`, a cheap time-axis read for
//! de-duplication, and a full read for queries and diagnostics.
//!
//! The object store is async; zarrs access goes through the async-to-sync
//! storage adapter, so every method here performs blocking I/O and must run
//! on a multi-threaded tokio runtime.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use object_store::ObjectStore;
use serde_json::Map;
use tracing::debug;
use zarrs::array::{Array, DataType, FillValue};
use zarrs::group::Group;
use zarrs_object_store::AsyncObjectStore;
use zarrs_storage::storage_adapter::async_to_sync::{
    AsyncToSyncBlockOn, AsyncToSyncStorageAdapter,
};

use crate::dataset::{ChunkSpec, Dataset};
use crate::error::{GridStoreError, Result};
use crate::schema;
use crate::zarr_io::{extend_array, read_array, store_group_attrs, write_array, ArraySpec};

/// Blocking executor that works from within a tokio runtime.
///
/// Uses `tokio::task::block_in_place` to move the current task to a blocking
/// thread, then uses the runtime handle to drive the future. This avoids the
/// "cannot start a runtime from within a runtime" error.
#[derive(Clone, Copy)]
pub struct TokioBlockOn;

impl AsyncToSyncBlockOn for TokioBlockOn {
    fn block_on<F: core::future::Future>(&self, future: F) -> F::Output {
        // block_in_place moves the current task off the async worker thread
        // so we can safely call block_on without nesting runtimes
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
    }
}

/// Sync storage over an async object store.
pub type ArchiveStorage =
    AsyncToSyncStorageAdapter<AsyncObjectStore<Arc<dyn ObjectStore>>, TokioBlockOn>;

/// How a commit writes the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Create a new archive; callers probe for existence first.
    Create,
    /// Extend the existing archive along the `time` dimension.
    Append,
}

/// Handle to one (month, parameter) archive on object storage.
pub struct ArchiveStore {
    storage: Arc<ArchiveStorage>,
    prefix: String,
}

impl ArchiveStore {
    /// Wrap an object store; `prefix` is the store location within the
    /// bucket, e.g. `meteo_data/202504/CLSTEMPERATURE.zarr`.
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        let async_store = Arc::new(AsyncObjectStore::new(store));
        let storage = Arc::new(AsyncToSyncStorageAdapter::new(async_store, TokioBlockOn));

        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    fn root_path(&self) -> String {
        format!("/{}", self.prefix)
    }

    fn node_path(&self, name: &str) -> String {
        format!("/{}/{}", self.prefix, name)
    }

    /// Read only the archive's time coordinate.
    ///
    /// This is the cheap pre-commit read: one small array, never the data
    /// variable.
    pub fn read_time_axis(&self) -> Result<Vec<DateTime<Utc>>> {
        let secs: Vec<i64> = read_array(self.storage.clone(), &self.node_path("time"))?;
        secs.into_iter().map(schema::from_epoch_seconds).collect()
    }

    /// Write a batch dataset under the given mode.
    pub fn write(&self, dataset: &Dataset, mode: CommitMode) -> Result<()> {
        dataset.validate()?;
        match mode {
            CommitMode::Create => self.create(dataset),
            CommitMode::Append => self.append(dataset),
        }
    }

    /// Read the full archive back into a dataset.
    pub fn open(&self) -> Result<Dataset> {
        let group = Group::open(self.storage.clone(), &self.root_path())
            .map_err(|e| GridStoreError::OpenFailed(e.to_string()))?;
        let attrs = group.attributes();

        let variable = schema::primary_variable(attrs)?;
        let has_step = schema::has_step(attrs);

        let data: Vec<f32> = read_array(self.storage.clone(), &self.node_path(&variable))?;
        let time = self.read_time_axis()?;
        let step = if has_step {
            Some(read_array(self.storage.clone(), &self.node_path("step"))?)
        } else {
            None
        };
        let latitude: Vec<f64> = read_array(self.storage.clone(), &self.node_path("latitude"))?;
        let longitude: Vec<f64> = read_array(self.storage.clone(), &self.node_path("longitude"))?;

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

    fn create(&self, dataset: &Dataset) -> Result<()> {
        let spec = ChunkSpec::bounded(dataset);
        let dims: Vec<String> = dataset.dim_names();
        let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();

        debug!(prefix = %self.prefix, shape = ?dataset.shape(), "Creating archive store");

        store_group_attrs(
            self.storage.clone(),
            &self.root_path(),
            schema::group_attrs(dataset, dataset.time.len() as u64),
        )?;

        write_array(
            self.storage.clone(),
            &self.node_path(&dataset.variable),
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
            self.storage.clone(),
            &self.node_path("time"),
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
                self.storage.clone(),
                &self.node_path("step"),
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
            self.storage.clone(),
            &self.node_path("latitude"),
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
            self.storage.clone(),
            &self.node_path("longitude"),
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

    fn append(&self, dataset: &Dataset) -> Result<()> {
        let group = Group::open(self.storage.clone(), &self.root_path())
            .map_err(|e| GridStoreError::OpenFailed(e.to_string()))?;
        let variable = schema::primary_variable(group.attributes())?;
        if variable != dataset.variable {
            return Err(GridStoreError::ShapeMismatch(format!(
                "archive variable {} does not match batch variable {}",
                variable, dataset.variable
            )));
        }

        let existing = Array::open(self.storage.clone(), &self.node_path(&variable))
            .map_err(|e| GridStoreError::OpenFailed(e.to_string()))?;

        let old_shape = existing.shape().to_vec();
        let batch_shape = dataset.shape();
        if old_shape.len() != batch_shape.len() || old_shape[1..] != batch_shape[1..] {
            return Err(GridStoreError::ShapeMismatch(format!(
                "archive shape {:?} does not match batch shape {:?}",
                old_shape, batch_shape
            )));
        }

        let old_times = old_shape[0];
        let new_times = old_times + batch_shape[0];

        debug!(
            prefix = %self.prefix,
            existing = old_times,
            appending = batch_shape[0],
            "Appending to archive store"
        );

        // Extend the data variable: same chunk grid, longer time axis,
        // metadata overwritten in place; existing chunks stay valid.
        let mut new_shape = old_shape.clone();
        new_shape[0] = new_times;
        let dims: Vec<String> = dataset.dim_names();
        let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();

        let mut start = vec![0u64; new_shape.len()];
        start[0] = old_times;
        extend_array(
            self.storage.clone(),
            &self.node_path(&variable),
            ArraySpec {
                shape: new_shape,
                chunk_shape: Vec::new(), // taken from the existing array
                data_type: DataType::Float32,
                fill_value: FillValue::from(f32::NAN),
                dims: &dim_refs,
                attrs: Map::new(),
                compress: true,
            },
            start,
            batch_shape.clone(),
            &dataset.data,
        )?;

        // Extend the time coordinate in lockstep.
        let times: Vec<i64> = dataset.time.iter().map(|t| schema::epoch_seconds(*t)).collect();
        extend_array(
            self.storage.clone(),
            &self.node_path("time"),
            ArraySpec {
                shape: vec![new_times],
                chunk_shape: Vec::new(),
                data_type: DataType::Int64,
                fill_value: FillValue::from(0i64),
                dims: &["time"],
                attrs: schema::time_attrs(),
                compress: false,
            },
            vec![old_times],
            vec![times.len() as u64],
            &times,
        )?;

        // Refresh the consolidated structure summary.
        store_group_attrs(
            self.storage.clone(),
            &self.root_path(),
            schema::group_attrs(dataset, new_times),
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use object_store::memory::InMemory;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, hour, 0, 0).unwrap()
    }

    fn record(hour: u32, base: f32) -> Dataset {
        Dataset {
            variable: "CLSTEMPERATURE".to_string(),
            data: (0..8).map(|i| base + i as f32).collect(),
            time: vec![ts(hour)],
            step: Some(vec![0, 1]),
            latitude: vec![50.0, 49.5],
            longitude: vec![14.0, 14.5],
        }
    }

    fn memory_archive() -> ArchiveStore {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        ArchiveStore::new(store, "meteo_data/202504/CLSTEMPERATURE.zarr")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_then_read_time_axis() {
        let archive = memory_archive();
        let batch = Dataset::concat_time(vec![record(0, 0.0), record(6, 100.0)]).unwrap();

        archive.write(&batch, CommitMode::Create).unwrap();

        let times = archive.read_time_axis().unwrap();
        assert_eq!(times, vec![ts(0), ts(6)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_append_extends_time_axis() {
        let archive = memory_archive();
        let first = Dataset::concat_time(vec![record(0, 0.0), record(6, 100.0)]).unwrap();
        archive.write(&first, CommitMode::Create).unwrap();

        let second = record(12, 200.0);
        archive.write(&second, CommitMode::Append).unwrap();

        let times = archive.read_time_axis().unwrap();
        assert_eq!(times, vec![ts(0), ts(6), ts(12)]);

        let full = archive.open().unwrap();
        assert_eq!(full.time.len(), 3);
        assert_eq!(full.data.len(), 24);
        // Appended block lands after the existing records
        assert_eq!(full.data[16], 200.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_append_rejects_mismatched_grid() {
        let archive = memory_archive();
        archive.write(&record(0, 0.0), CommitMode::Create).unwrap();

        let mut bad = record(6, 0.0);
        bad.step = Some(vec![0, 1, 2]);
        bad.data = vec![0.0; 12];

        let result = archive.write(&bad, CommitMode::Append);
        assert!(matches!(result, Err(GridStoreError::ShapeMismatch(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_missing_archive_fails() {
        let archive = memory_archive();
        assert!(archive.read_time_axis().is_err());
    }
}
