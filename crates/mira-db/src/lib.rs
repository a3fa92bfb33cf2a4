//! Mira Database Layer
//!
//! Postgres repositories for tenants, principals, login tokens, secrets,
//! the document ledger and the audit log, plus the embedded migrator.

pub mod db;
pub mod repository_traits;

use std::time::Duration;

use mira_core::{AppError, Config};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

// Re-exports: repositories
pub use db::{
    database_size, AuditRepository, DocumentRepository, LoginTokenRepository,
    PrincipalRepository, SecretRepository, TenantRepository,
};

// Re-exports: transaction utilities
pub use db::transaction::{with_transaction, TransactionGuard};

// Re-exports: repository traits
pub use repository_traits::{
    AuditRepositoryTrait, DocumentRepositoryTrait, LoginTokenRepositoryTrait,
    PrincipalRepositoryTrait, SecretRepositoryTrait,
};

/// Schema migrations from the workspace `migrations/` directory.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Open the connection pool. A missing `DATABASE_URL` is a configuration
/// error reported here, at first use.
pub async fn connect(config: &Config) -> Result<PgPool, AppError> {
    let url = config.require_database_url()?;
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(url)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            AppError::Database(e)
        })?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );
    Ok(pool)
}

/// Apply pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    MIGRATOR.run(pool).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to run database migrations");
        AppError::InternalWithSource {
            message: "Failed to run database migrations".to_string(),
            source: e.into(),
        }
    })?;
    tracing::info!("Database migrations applied");
    Ok(())
}
