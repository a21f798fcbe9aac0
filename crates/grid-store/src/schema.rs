//! Shared metadata conventions for converted stores and archives.
//!
//! Both the local converted stores and the remote per-month archives use the
//! same Zarr V3 layout: one f32 data variable plus coordinate arrays `time`
//! (i64 seconds since epoch, CF units attribute), `step` (i64 hours),
//! `latitude` and `longitude` (f64).

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::dataset::{ChunkSpec, Dataset};
use crate::error::{GridStoreError, Result};

/// Group attribute listing the data variables, first entry is primary.
pub const ATTR_DATA_VARS: &str = "data_vars";
/// Group attribute listing the coordinate arrays present in the store.
pub const ATTR_COORDINATES: &str = "coordinates";
/// Group attribute holding the per-array structure summary, written after
/// every commit so clients can open the store from a single metadata read.
pub const ATTR_CONSOLIDATED: &str = "consolidated_metadata";

pub fn epoch_seconds(ts: DateTime<Utc>) -> i64 {
    ts.timestamp()
}

pub fn from_epoch_seconds(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| GridStoreError::InvalidMetadata(format!("invalid epoch time {}", secs)))
}

/// Attributes for the `time` coordinate array.
pub fn time_attrs() -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert(
        "units".to_string(),
        json!("seconds since 1970-01-01T00:00:00Z"),
    );
    attrs.insert("calendar".to_string(), json!("proleptic_gregorian"));
    attrs
}

/// Attributes for the `step` coordinate array.
pub fn step_attrs() -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert("units".to_string(), json!("hours"));
    attrs
}

/// Root group attributes: variable listing plus the consolidated structure
/// summary for the current shape of every array.
pub fn group_attrs(dataset: &Dataset, time_len: u64) -> Map<String, Value> {
    let mut coords = vec!["time"];
    if dataset.step.is_some() {
        coords.push("step");
    }
    coords.push("latitude");
    coords.push("longitude");

    let mut shape = dataset.shape();
    shape[0] = time_len;

    let mut arrays = Map::new();
    arrays.insert(
        dataset.variable.clone(),
        json!({
            "shape": shape,
            "dtype": "float32",
            "dims": dataset.dim_names(),
        }),
    );
    arrays.insert(
        "time".to_string(),
        json!({ "shape": [time_len], "dtype": "int64", "dims": ["time"] }),
    );
    if let Some(step) = &dataset.step {
        arrays.insert(
            "step".to_string(),
            json!({ "shape": [step.len()], "dtype": "int64", "dims": ["step"] }),
        );
    }
    arrays.insert(
        "latitude".to_string(),
        json!({ "shape": [dataset.latitude.len()], "dtype": "float64", "dims": ["latitude"] }),
    );
    arrays.insert(
        "longitude".to_string(),
        json!({ "shape": [dataset.longitude.len()], "dtype": "float64", "dims": ["longitude"] }),
    );

    let mut attrs = Map::new();
    attrs.insert(ATTR_DATA_VARS.to_string(), json!([dataset.variable]));
    attrs.insert(ATTR_COORDINATES.to_string(), json!(coords));
    attrs.insert(ATTR_CONSOLIDATED.to_string(), json!({ "arrays": arrays }));
    attrs
}

/// Chunk shape for the data variable under a chunking policy.
pub fn data_chunk_shape(dataset: &Dataset, spec: ChunkSpec) -> Vec<u64> {
    let mut chunks = vec![spec.time];
    if let Some(step_chunk) = spec.step {
        chunks.push(step_chunk);
    }
    chunks.push(dataset.latitude.len().max(1) as u64);
    chunks.push(dataset.longitude.len().max(1) as u64);
    chunks
}

/// The primary data variable named by the group attributes.
pub fn primary_variable(attrs: &Map<String, Value>) -> Result<String> {
    attrs
        .get(ATTR_DATA_VARS)
        .and_then(|v| v.as_array())
        .and_then(|vars| vars.first())
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or(GridStoreError::MissingDataVariable)
}

/// Whether the group attributes declare a `step` coordinate.
pub fn has_step(attrs: &Map<String, Value>) -> bool {
    attrs
        .get(ATTR_COORDINATES)
        .and_then(|v| v.as_array())
        .map(|coords| coords.iter().any(|c| c.as_str() == Some("step")))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_epoch_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2025, 4, 1, 6, 0, 0).unwrap();
        assert_eq!(from_epoch_seconds(epoch_seconds(ts)).unwrap(), ts);
    }

    #[test]
    fn test_group_attrs_name_primary_variable() {
        let ds = Dataset {
            variable: "CLSTEMPERATURE".to_string(),
            data: vec![0.0; 4],
            time: vec![Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()],
            step: None,
            latitude: vec![50.0, 49.5],
            longitude: vec![14.0, 14.5],
        };

        let attrs = group_attrs(&ds, 1);
        assert_eq!(primary_variable(&attrs).unwrap(), "CLSTEMPERATURE");
        assert!(!has_step(&attrs));
    }
}
