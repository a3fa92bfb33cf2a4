//! Mira Storage Library
//!
//! Blob storage for uploaded documents, on the local filesystem or an
//! S3-compatible object store.
//!
//! # Storage key format
//!
//! Keys are content-addressed and tenant-scoped:
//!
//! `{tenant_id}/{principal_id}/{sha256}/{filename}`
//!
//! Identical bytes uploaded by the same principal map to the same key, so a
//! second write is skipped. Keys must not contain `..` or a leading `/`. Key
//! generation lives in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{content_key, sanitize_filename};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use mira_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult, StoredObject};
