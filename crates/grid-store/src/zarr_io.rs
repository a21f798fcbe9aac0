//! Generic Zarr array helpers shared by local stores and remote archives.
//!
//! Everything here is synchronous; remote archives reach the sync API
//! through the async-to-sync storage adapter in [`crate::archive`].

use std::sync::Arc;

use serde_json::{Map, Value};
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{Array, ArrayBuilder, DataType, DimensionName, Element, ElementOwned, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs::storage::{ReadableStorageTraits, WritableStorageTraits};

use crate::error::{GridStoreError, Result};

/// Compression level for data variables; coordinates stay uncompressed.
const BLOSC_LEVEL: u8 = 5;

/// Blosc-zstd codec for the data variable.
fn data_codec() -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
    let level = BloscCompressionLevel::try_from(BLOSC_LEVEL)
        .map_err(|_| GridStoreError::InvalidMetadata("invalid compression level".to_string()))?;

    // typesize 4 for f32, required with shuffle enabled
    let codec = BloscCodec::new(
        BloscCompressor::Zstd,
        level,
        None,
        BloscShuffleMode::Shuffle,
        Some(4),
    )
    .map_err(|e| GridStoreError::InvalidMetadata(e.to_string()))?;

    Ok(Arc::new(codec))
}

/// Settings for one array node.
pub(crate) struct ArraySpec<'a> {
    pub shape: Vec<u64>,
    pub chunk_shape: Vec<u64>,
    pub data_type: DataType,
    pub fill_value: FillValue,
    pub dims: &'a [&'a str],
    pub attrs: Map<String, Value>,
    pub compress: bool,
}

pub(crate) fn build_array<S>(store: Arc<S>, path: &str, spec: ArraySpec<'_>) -> Result<Array<S>>
where
    S: ReadableStorageTraits + WritableStorageTraits + 'static,
{
    let chunk_grid: zarrs::array::ChunkGrid = spec
        .chunk_shape
        .try_into()
        .map_err(|e| GridStoreError::InvalidMetadata(format!("{:?}", e)))?;

    let dims: Vec<DimensionName> = spec.dims.iter().map(|n| DimensionName::new(*n)).collect();

    let mut builder = ArrayBuilder::new(spec.shape, spec.data_type, chunk_grid, spec.fill_value);
    builder.dimension_names(Some(dims)).attributes(spec.attrs);
    if spec.compress {
        builder.bytes_to_bytes_codecs(vec![data_codec()?]);
    }

    builder
        .build(store, path)
        .map_err(|e| GridStoreError::WriteFailed(e.to_string()))
}

/// Create an array and write its full contents.
pub(crate) fn write_array<S, T>(
    store: Arc<S>,
    path: &str,
    spec: ArraySpec<'_>,
    data: &[T],
) -> Result<()>
where
    S: ReadableStorageTraits + WritableStorageTraits + 'static,
    T: Element + Copy,
{
    let shape = spec.shape.clone();
    let array = build_array(store, path, spec)?;

    array
        .store_metadata()
        .map_err(|e| GridStoreError::WriteFailed(e.to_string()))?;

    let subset = ArraySubset::new_with_shape(shape);
    array
        .store_array_subset_elements(&subset, data)
        .map_err(|e| GridStoreError::WriteFailed(e.to_string()))?;

    Ok(())
}

/// Rewrite an existing array's metadata with an extended shape and write the
/// new block at `start`, keeping the existing chunk grid so prior chunks
/// stay valid.
pub(crate) fn extend_array<S, T>(
    store: Arc<S>,
    path: &str,
    mut spec: ArraySpec<'_>,
    start: Vec<u64>,
    block_shape: Vec<u64>,
    data: &[T],
) -> Result<()>
where
    S: ReadableStorageTraits + WritableStorageTraits + 'static,
    T: Element + Copy,
{
    let existing = Array::open(store.clone(), path)
        .map_err(|e| GridStoreError::OpenFailed(e.to_string()))?;

    let origin = vec![0u64; existing.shape().len()];
    let chunk_shape = existing
        .chunk_grid()
        .chunk_shape(&origin, existing.shape())
        .map_err(|e| GridStoreError::InvalidMetadata(e.to_string()))?
        .ok_or_else(|| GridStoreError::InvalidMetadata("missing chunk shape".to_string()))?;
    spec.chunk_shape = chunk_shape.iter().map(|c| c.get()).collect();

    let array = build_array(store, path, spec)?;
    array
        .store_metadata()
        .map_err(|e| GridStoreError::WriteFailed(e.to_string()))?;

    let subset = ArraySubset::new_with_start_shape(start, block_shape)
        .map_err(|e| GridStoreError::WriteFailed(e.to_string()))?;
    array
        .store_array_subset_elements(&subset, data)
        .map_err(|e| GridStoreError::WriteFailed(e.to_string()))?;

    Ok(())
}

/// Read an array's full contents.
pub(crate) fn read_array<S, T>(store: Arc<S>, path: &str) -> Result<Vec<T>>
where
    S: ReadableStorageTraits + 'static,
    T: ElementOwned,
{
    let array = Array::open(store, path)
        .map_err(|e| GridStoreError::OpenFailed(e.to_string()))?;

    let subset = ArraySubset::new_with_shape(array.shape().to_vec());
    array
        .retrieve_array_subset_elements(&subset)
        .map_err(|e| GridStoreError::ReadFailed(e.to_string()))
}

/// Store group metadata with the given attributes at `path`.
pub(crate) fn store_group_attrs<S>(
    store: Arc<S>,
    path: &str,
    attrs: Map<String, Value>,
) -> Result<()>
where
    S: ReadableStorageTraits + WritableStorageTraits + 'static,
{
    let group = GroupBuilder::new()
        .attributes(attrs)
        .build(store, path)
        .map_err(|e| GridStoreError::WriteFailed(e.to_string()))?;
    group
        .store_metadata()
        .map_err(|e| GridStoreError::WriteFailed(e.to_string()))
}
