//! Mira Core Library
//!
//! Domain models, error types, configuration and the secret cipher shared by
//! every Mira component.

pub mod config;
pub mod encryption;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, OpenAiConfig, S3Config, SmtpConfig};
pub use encryption::EncryptionService;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
