//! Error types module
//!
//! All fallible operations in Mira surface an `AppError`. Each variant
//! self-describes how it should be presented to an end user through
//! `ErrorMetadata`, so the outer surfaces (CLI, chat) print a short actionable
//! message while the full error chain goes to the operational log.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a missing credential
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error is presented to the user.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "DATABASE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried or fixed by the user)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from end users
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Login failed")]
    LoginFailed,

    #[error("{service} is not configured: {message}")]
    NotConfigured { service: String, message: String },

    #[error("{service} request failed: {message}")]
    External { service: String, message: String },

    #[error("{service} request timed out after {seconds}s")]
    Timeout { service: String, seconds: u64 },

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (&'static str, bool, Option<&'static str>, bool, LogLevel) {
    match err {
        AppError::Database(_) => (
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Config(_) => (
            "CONFIGURATION_ERROR",
            false,
            Some("Set the named environment variable and restart"),
            false,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            "INVALID_INPUT",
            false,
            Some("Check the input and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            "NOT_FOUND",
            false,
            Some("Verify the identifier exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            "UNAUTHORIZED",
            false,
            Some("Request a new login link"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            "FORBIDDEN",
            false,
            Some("Ask a tenant administrator to perform this action"),
            false,
            LogLevel::Debug,
        ),
        AppError::LoginFailed => (
            "LOGIN_FAILED",
            false,
            Some("Request a new login link"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotConfigured { .. } => (
            "NOT_CONFIGURED",
            true,
            Some("Save the missing credential and try again"),
            false,
            LogLevel::Warn,
        ),
        AppError::External { .. } => (
            "EXTERNAL_SERVICE_ERROR",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
        ),
        AppError::Timeout { .. } => (
            "TIMEOUT",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
        ),
        AppError::Encryption(_) => (
            "ENCRYPTION_ERROR",
            false,
            Some("Check SECRETS_MASTER_KEY"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Shorthand for a missing-credential error on an external service.
    pub fn not_configured(service: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::NotConfigured {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a failed call to an external service.
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::External {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).2
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Config(ref msg) => msg.clone(),
            AppError::Storage(_) => "Failed to access file storage".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Forbidden(ref msg) => msg.clone(),
            AppError::LoginFailed => "Login failed".to_string(),
            AppError::NotConfigured { service, .. } => {
                format!("{} is not configured", service)
            }
            AppError::External { service, message } => {
                format!("{} request failed: {}", service, message)
            }
            AppError::Timeout { service, seconds } => {
                format!("{} did not respond within {}s", service, seconds)
            }
            AppError::Encryption(_) => "Failed to process a stored secret".to_string(),
            AppError::Internal(_) => "Internal error".to_string(),
            AppError::InternalWithSource { .. } => "Internal error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_login_failed_hides_cause() {
        let err = AppError::LoginFailed;
        assert_eq!(err.client_message(), "Login failed");
        assert_eq!(err.error_code(), "LOGIN_FAILED");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_not_configured_is_recoverable_warning() {
        let err = AppError::not_configured("Trello", "trello_api_key missing");
        assert!(err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Warn);
        assert_eq!(err.client_message(), "Trello is not configured");
    }

    #[test]
    fn test_timeout_message_names_service() {
        let err = AppError::Timeout {
            service: "OpenAI".to_string(),
            seconds: 60,
        };
        assert_eq!(err.to_string(), "OpenAI request timed out after 60s");
        assert!(err.client_message().contains("60s"));
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("inner").context("outer"));
        let details = err.detailed_message();
        assert!(details.contains("Internal error with source"));
        assert!(details.contains("outer"));
    }
}
