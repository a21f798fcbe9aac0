//! Object storage interface for archive data (AWS S3 compatible).

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use object_store::{aws::AmazonS3Builder, path::Path, ObjectStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use meteo_common::{MeteoError, MeteoResult};

/// Configuration for the object storage connection.
///
/// Constructed once at process start and passed by reference into every
/// component that talks to storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// Bucket name
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Optional S3-compatible endpoint (MinIO etc.); AWS when absent
    pub endpoint: Option<String>,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            bucket: "meteodatabucket".to_string(),
            region: "eu-central-1".to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            endpoint: None,
            allow_http: false,
        }
    }
}

/// Object storage client for archive data.
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Create a new object storage client from config.
    pub fn new(config: &ObjectStorageConfig) -> MeteoResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| MeteoError::StorageError(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }

    /// Wrap an already-built store (in-memory or local filesystem in tests).
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// The inner store, for layers that speak `ObjectStore` directly (zarr I/O).
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Write bytes to a path in the bucket.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes) -> MeteoResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| MeteoError::StorageError(format!("Failed to write {}: {}", path, e)))?;

        Ok(())
    }

    /// Read bytes from a path.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn get(&self, path: &str) -> MeteoResult<Bytes> {
        let location = Path::from(path);

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| match e {
                object_store::Error::NotFound { .. } => MeteoError::ObjectNotFound(path.to_string()),
                e => MeteoError::StorageError(format!("Failed to read {}: {}", path, e)),
            })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| MeteoError::StorageError(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Check whether at least one object exists under a prefix.
    ///
    /// Polls only the first entry of the listing — equivalent to a
    /// max-keys=1 list request, never a content read. Prefixes match whole
    /// path components, so a sibling store sharing a name prefix
    /// (`CLSTEMP.zarr` vs `CLSTEMPERATURE.zarr`) cannot collide.
    ///
    /// A listing failure is an error, distinct from `Ok(false)`: callers
    /// must never treat a failed probe as "absent".
    pub async fn exists_prefix(&self, prefix: &str) -> MeteoResult<bool> {
        let prefix_path = Path::from(prefix);

        let mut stream = self.store.list(Some(&prefix_path));
        match stream.next().await {
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(MeteoError::StorageError(format!(
                "Failed to probe {}: {}",
                prefix, e
            ))),
            None => Ok(false),
        }
    }

    /// List the immediate sub-directories of a prefix (delimiter listing).
    ///
    /// Returns the final path component of each common prefix, e.g. the
    /// month keys under `meteo_data/`.
    pub async fn list_dirs(&self, prefix: &str) -> MeteoResult<Vec<String>> {
        let prefix_path = Path::from(prefix);

        let result = self
            .store
            .list_with_delimiter(Some(&prefix_path))
            .await
            .map_err(|e| MeteoError::StorageError(format!("List failed for {}: {}", prefix, e)))?;

        let mut dirs: Vec<String> = result
            .common_prefixes
            .iter()
            .filter_map(|p| p.parts().last().map(|part| part.as_ref().to_string()))
            .collect();
        dirs.sort();

        Ok(dirs)
    }

    /// List objects with a given prefix.
    pub async fn list(&self, prefix: &str) -> MeteoResult<Vec<String>> {
        let prefix_path = Path::from(prefix);
        let mut paths = Vec::new();

        let mut stream = self.store.list(Some(&prefix_path));
        while let Some(meta) = stream
            .next()
            .await
            .transpose()
            .map_err(|e| MeteoError::StorageError(format!("List failed: {}", e)))?
        {
            paths.push(meta.location.to_string());
        }

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn memory_storage() -> ObjectStorage {
        ObjectStorage::from_store(Arc::new(InMemory::new()), "test-bucket")
    }

    #[tokio::test]
    async fn test_exists_prefix_absent_then_present() {
        let storage = memory_storage();

        assert!(!storage
            .exists_prefix("meteo_data/202504/CLSTEMPERATURE.zarr")
            .await
            .unwrap());

        storage
            .put(
                "meteo_data/202504/CLSTEMPERATURE.zarr/zarr.json",
                Bytes::from_static(b"{}"),
            )
            .await
            .unwrap();

        assert!(storage
            .exists_prefix("meteo_data/202504/CLSTEMPERATURE.zarr")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_exists_prefix_does_not_match_sibling_stores() {
        let storage = memory_storage();

        storage
            .put(
                "meteo_data/202504/CLSTEMPERATURE.zarr/zarr.json",
                Bytes::from_static(b"{}"),
            )
            .await
            .unwrap();

        // Component-wise prefix: the shorter sibling name must not match.
        assert!(!storage
            .exists_prefix("meteo_data/202504/CLSTEMP.zarr")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_dirs_returns_month_keys() {
        let storage = memory_storage();

        for month in ["202503", "202504"] {
            storage
                .put(
                    &format!("meteo_data/{}/CLSTEMPERATURE.zarr/zarr.json", month),
                    Bytes::from_static(b"{}"),
                )
                .await
                .unwrap();
        }

        let dirs = storage.list_dirs("meteo_data").await.unwrap();
        assert_eq!(dirs, vec!["202503", "202504"]);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let storage = memory_storage();
        match storage.get("nope/missing").await {
            Err(MeteoError::ObjectNotFound(_)) => {}
            other => panic!("expected ObjectNotFound, got {:?}", other.map(|b| b.len())),
        }
    }
}
