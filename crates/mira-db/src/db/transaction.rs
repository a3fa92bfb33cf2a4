//! Database transaction utilities
//!
//! Multi-step writes (principal creation with role assignment, ledger row
//! plus audit entry) run inside one transaction.

use mira_core::AppError;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;

/// A database transaction that must be committed explicitly.
///
/// Dropping the guard without calling [`TransactionGuard::commit`] rolls the
/// transaction back when the connection returns to the pool.
///
/// # Example
///
/// ```ignore
/// use mira_db::TransactionGuard;
///
/// async fn example(pool: &sqlx::PgPool) -> Result<(), mira_core::AppError> {
///     let mut tx = TransactionGuard::begin(pool).await?;
///     sqlx::query("INSERT INTO ...").execute(&mut *tx).await?;
///     tx.commit().await
/// }
/// ```
pub struct TransactionGuard {
    transaction: Transaction<'static, Postgres>,
}

impl TransactionGuard {
    /// Begin a new database transaction
    pub async fn begin(pool: &PgPool) -> Result<Self, AppError> {
        let transaction = pool.begin().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to begin database transaction");
            AppError::Database(e)
        })?;
        Ok(Self { transaction })
    }

    /// Commit the transaction
    pub async fn commit(self) -> Result<(), AppError> {
        self.transaction.commit().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to commit database transaction");
            AppError::Database(e)
        })
    }

    /// Roll back the transaction
    pub async fn rollback(self) -> Result<(), AppError> {
        self.transaction.rollback().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to rollback database transaction");
            AppError::Database(e)
        })
    }
}

impl Deref for TransactionGuard {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

impl DerefMut for TransactionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transaction
    }
}

/// Boxed future returned by a transaction body.
pub type TxFuture<'a, R> = Pin<Box<dyn Future<Output = Result<R, AppError>> + Send + 'a>>;

/// Execute a closure within a database transaction
///
/// Commits when the closure succeeds, rolls back when it fails.
///
/// ```ignore
/// with_transaction(pool, |conn| Box::pin(async move {
///     sqlx::query("INSERT INTO ...").execute(&mut *conn).await?;
///     sqlx::query("UPDATE ...").execute(&mut *conn).await?;
///     Ok(())
/// })).await
/// ```
pub async fn with_transaction<F, R>(pool: &PgPool, f: F) -> Result<R, AppError>
where
    F: for<'a> FnOnce(&'a mut PgConnection) -> TxFuture<'a, R>,
{
    let mut tx = TransactionGuard::begin(pool).await?;

    match f(&mut *tx).await {
        Ok(result) => {
            tx.commit().await?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback after failed transaction body failed");
            }
            Err(e)
        }
    }
}
