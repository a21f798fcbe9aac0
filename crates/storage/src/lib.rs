//! Object storage access for the meteo archive (S3 compatible).

pub mod object_store;
pub mod paths;

pub use crate::object_store::{ObjectStorage, ObjectStorageConfig};
pub use paths::StoragePath;
