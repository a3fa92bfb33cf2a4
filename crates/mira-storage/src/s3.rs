use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use mira_core::S3Config;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload, Result as ObjectResult};

/// S3-compatible storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage from explicit endpoint and credentials
    /// (AWS, MinIO, DigitalOcean Spaces and similar).
    pub fn new(config: &S3Config) -> StorageResult<Self> {
        let allow_http = config.endpoint.starts_with("http://");
        let store = AmazonS3Builder::from_env()
            .with_region(config.region.clone())
            .with_bucket_name(config.bucket.clone())
            .with_endpoint(config.endpoint.clone())
            .with_allow_http(allow_http)
            .with_access_key_id(config.access_key.clone())
            .with_secret_access_key(config.secret_key.clone())
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket: config.bucket.clone(),
        })
    }

    fn object_path(key: &str) -> StorageResult<Path> {
        if !validate_key(key) {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        Ok(Path::from(key.to_string()))
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<StoredObject> {
        let location = self.location(key);

        if self.exists(key).await? {
            tracing::debug!(bucket = %self.bucket, key = %key, "Object already stored, skipping write");
            return Ok(StoredObject {
                key: key.to_string(),
                location,
                written: false,
            });
        }

        let path = Self::object_path(key)?;
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self
            .store
            .put(&path, PutPayload::from(Bytes::from(data)))
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(StoredObject {
            key: key.to_string(),
            location,
            written: true,
        })
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = Self::object_path(key)?;

        let result: ObjectResult<_> = self.store.get(&path).await;
        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(error = %other, bucket = %self.bucket, key = %key, "S3 download failed");
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = Self::object_path(key)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = Self::object_path(key)?;

        let result: ObjectResult<_> = self.store.delete(&path).await;
        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, bucket = %self.bucket, key = %key, "S3 delete failed");
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
