use mira_core::AppError;
use sqlx::{PgPool, Postgres};

/// Size of the current database in bytes.
#[tracing::instrument(skip(pool), fields(db.operation = "pg_database_size"))]
pub async fn database_size(pool: &PgPool) -> Result<i64, AppError> {
    sqlx::query_scalar::<Postgres, i64>("SELECT pg_database_size(current_database())")
        .fetch_one(pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to read database size");
            AppError::Database(e)
        })
}
