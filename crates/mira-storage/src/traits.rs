//! Storage abstraction trait

use crate::StorageBackend;
use async_trait::async_trait;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<StorageError> for mira_core::AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConfigError(msg) => mira_core::AppError::Config(msg),
            StorageError::InvalidKey(msg) => mira_core::AppError::InvalidInput(msg),
            StorageError::NotFound(key) => mira_core::AppError::NotFound(key),
            other => mira_core::AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    /// Backend-specific location recorded in the document ledger
    /// (a filesystem path or `s3://bucket/key`).
    pub location: String,
    /// False when an object already existed under the key.
    pub written: bool,
}

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait so the
/// upload service works with either without knowing which one is active.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `key`. When an object already exists under the key
    /// the write is skipped; content-addressed keys make that idempotent.
    async fn put(&self, key: &str, data: Vec<u8>) -> StorageResult<StoredObject>;

    /// Read an object by key
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Location string for a key
    fn location(&self, key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
