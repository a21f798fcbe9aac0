//! In-memory dataset model for one meteorological parameter.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use meteo_common::BoundingBox;

use crate::error::{GridStoreError, Result};

/// Maximum number of forecast-step entries carried into an archive.
///
/// Records arriving with a longer step dimension are truncated to the first
/// [`MAX_STEPS`] entries before merge.
pub const MAX_STEPS: usize = 72;

/// Chunk sizes applied when a dataset is written to a store.
///
/// Spatial dimensions are always stored as a single chunk; only `time` and
/// `step` are bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    pub time: u64,
    pub step: Option<u64>,
}

impl ChunkSpec {
    /// The bounded chunking policy: time chunks of at most 5 entries, step
    /// chunks of at most 20.
    pub fn bounded(dataset: &Dataset) -> Self {
        Self {
            time: dataset.time.len().min(5).max(1) as u64,
            step: dataset
                .step
                .as_ref()
                .map(|s| s.len().min(20).max(1) as u64),
        }
    }
}

/// One parameter's data over `time x step? x latitude x longitude`.
///
/// `data` is row-major over the dimensions in that order; the step dimension
/// is absent for parameters without a forecast lead axis.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Data variable name (the canonical parameter name once loaded).
    pub variable: String,
    /// Row-major values, length `time.len() * slab_len()`.
    pub data: Vec<f32>,
    /// Time coordinate, one entry per record.
    pub time: Vec<DateTime<Utc>>,
    /// Forecast step coordinate in hours, if the parameter has one.
    pub step: Option<Vec<i64>>,
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
}

impl Dataset {
    /// Number of values in one time slab (all non-time dimensions).
    pub fn slab_len(&self) -> usize {
        let step_len = self.step.as_ref().map_or(1, Vec::len);
        step_len * self.latitude.len() * self.longitude.len()
    }

    /// Array shape in dimension order: time, step (if present), latitude, longitude.
    pub fn shape(&self) -> Vec<u64> {
        let mut shape = vec![self.time.len() as u64];
        if let Some(step) = &self.step {
            shape.push(step.len() as u64);
        }
        shape.push(self.latitude.len() as u64);
        shape.push(self.longitude.len() as u64);
        shape
    }

    /// Dimension names matching [`Dataset::shape`].
    pub fn dim_names(&self) -> Vec<String> {
        let mut dims = vec!["time".to_string()];
        if self.step.is_some() {
            dims.push("step".to_string());
        }
        dims.push("latitude".to_string());
        dims.push("longitude".to_string());
        dims
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Validate that `data` agrees with the coordinate lengths.
    pub fn validate(&self) -> Result<()> {
        let expected = self.time.len() * self.slab_len();
        if self.data.len() != expected {
            return Err(GridStoreError::ShapeMismatch(format!(
                "{}: data has {} values, coordinates imply {}",
                self.variable,
                self.data.len(),
                expected
            )));
        }
        Ok(())
    }

    /// Rename the data variable.
    pub fn rename(&mut self, name: &str) {
        self.variable = name.to_string();
    }

    /// Replace the time coordinate with a single authoritative timestamp.
    ///
    /// The content time axis of a converted file is discarded in favor of the
    /// filename-derived time; only single-record datasets may be restamped.
    pub fn set_time(&mut self, ts: DateTime<Utc>) -> Result<()> {
        if self.time.len() != 1 {
            return Err(GridStoreError::ShapeMismatch(format!(
                "{}: cannot restamp a dataset with {} time entries",
                self.variable,
                self.time.len()
            )));
        }
        self.time = vec![ts];
        Ok(())
    }

    /// Truncate the step dimension to at most `max_steps` entries.
    pub fn truncate_step(&mut self, max_steps: usize) {
        let step_len = match &self.step {
            Some(step) if step.len() > max_steps => step.len(),
            _ => return,
        };

        let plane = self.latitude.len() * self.longitude.len();
        let old_slab = step_len * plane;
        let new_slab = max_steps * plane;

        let mut truncated = Vec::with_capacity(self.time.len() * new_slab);
        for t in 0..self.time.len() {
            let slab = &self.data[t * old_slab..t * old_slab + new_slab];
            truncated.extend_from_slice(slab);
        }

        self.data = truncated;
        if let Some(step) = &mut self.step {
            step.truncate(max_steps);
        }
    }

    /// Concatenate datasets along `time`, preserving input order.
    ///
    /// Callers are responsible for pre-sorting; no reordering happens here.
    /// All inputs must agree on the non-time dimensions.
    pub fn concat_time(mut datasets: Vec<Dataset>) -> Result<Dataset> {
        let mut iter = datasets.drain(..);
        let mut combined = iter
            .next()
            .ok_or(GridStoreError::MissingDataVariable)?;
        combined.validate()?;

        for ds in iter {
            ds.validate()?;
            if ds.step.as_ref().map(Vec::len) != combined.step.as_ref().map(Vec::len)
                || ds.latitude.len() != combined.latitude.len()
                || ds.longitude.len() != combined.longitude.len()
            {
                return Err(GridStoreError::ShapeMismatch(format!(
                    "{}: record shape {:?} does not match batch shape {:?}",
                    combined.variable,
                    ds.shape(),
                    combined.shape()
                )));
            }
            combined.time.extend_from_slice(&ds.time);
            combined.data.extend_from_slice(&ds.data);
        }

        Ok(combined)
    }

    /// Drop every record whose timestamp is in `existing`.
    ///
    /// Exact-equality matching; the result may be empty.
    pub fn without_times(&self, existing: &HashSet<DateTime<Utc>>) -> Dataset {
        let slab = self.slab_len();
        let mut time = Vec::new();
        let mut data = Vec::new();

        for (i, ts) in self.time.iter().enumerate() {
            if existing.contains(ts) {
                continue;
            }
            time.push(*ts);
            data.extend_from_slice(&self.data[i * slab..(i + 1) * slab]);
        }

        Dataset {
            variable: self.variable.clone(),
            data,
            time,
            step: self.step.clone(),
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
        }
    }

    /// Keep only records with `start <= time <= end`.
    pub fn select_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Dataset {
        let slab = self.slab_len();
        let mut time = Vec::new();
        let mut data = Vec::new();

        for (i, ts) in self.time.iter().enumerate() {
            if *ts < start || *ts > end {
                continue;
            }
            time.push(*ts);
            data.extend_from_slice(&self.data[i * slab..(i + 1) * slab]);
        }

        Dataset {
            variable: self.variable.clone(),
            data,
            time,
            step: self.step.clone(),
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
        }
    }

    /// Keep only grid columns/rows inside the bounding box.
    ///
    /// Works for ascending or descending coordinate order; the selected
    /// indices always form a contiguous block of the original axis.
    pub fn select_bbox(&self, bbox: &BoundingBox) -> Dataset {
        let lat_keep: Vec<usize> = self
            .latitude
            .iter()
            .enumerate()
            .filter(|(_, lat)| **lat >= bbox.min_lat && **lat <= bbox.max_lat)
            .map(|(i, _)| i)
            .collect();
        let lon_keep: Vec<usize> = self
            .longitude
            .iter()
            .enumerate()
            .filter(|(_, lon)| **lon >= bbox.min_lon && **lon <= bbox.max_lon)
            .map(|(i, _)| i)
            .collect();

        let step_len = self.step.as_ref().map_or(1, Vec::len);
        let (ny, nx) = (self.latitude.len(), self.longitude.len());

        let mut data = Vec::with_capacity(
            self.time.len() * step_len * lat_keep.len() * lon_keep.len(),
        );
        for t in 0..self.time.len() {
            for s in 0..step_len {
                let plane = (t * step_len + s) * ny * nx;
                for &y in &lat_keep {
                    let row = plane + y * nx;
                    for &x in &lon_keep {
                        data.push(self.data[row + x]);
                    }
                }
            }
        }

        Dataset {
            variable: self.variable.clone(),
            data,
            time: self.time.clone(),
            step: self.step.clone(),
            latitude: lat_keep.iter().map(|&i| self.latitude[i]).collect(),
            longitude: lon_keep.iter().map(|&i| self.longitude[i]).collect(),
        }
    }
}
