use mira_core::models::{SecretRecord, SecretScope};
use mira_core::AppError;
use sqlx::{PgPool, Postgres};

/// Encrypted secret rows in `user_secrets` / `company_secrets`. Values are
/// already ciphertext here; encryption happens in the secret store.
#[derive(Clone)]
pub struct SecretRepository {
    pool: PgPool,
}

impl SecretRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the value for `(scope, key_name)` atomically.
    #[tracing::instrument(
        skip(self, encrypted_value),
        fields(db.table = scope.table(), db.operation = "upsert")
    )]
    pub async fn upsert(
        &self,
        scope: SecretScope,
        key_name: &str,
        encrypted_value: &str,
    ) -> Result<SecretRecord, AppError> {
        let sql = format!(
            r#"
            INSERT INTO {} (owner_id, key_name, encrypted_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_id, key_name)
            DO UPDATE SET encrypted_value = EXCLUDED.encrypted_value, updated_at = now()
            RETURNING *
            "#,
            scope.table()
        );

        let record = sqlx::query_as::<Postgres, SecretRecord>(&sql)
            .bind(scope.owner_id())
            .bind(key_name)
            .bind(encrypted_value)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, scope = %scope, key_name = %key_name, "Failed to save secret");
                AppError::Database(e)
            })?;

        tracing::info!(scope = %scope, key_name = %key_name, "Secret saved");
        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = scope.table(), db.operation = "select"))]
    pub async fn get(
        &self,
        scope: SecretScope,
        key_name: &str,
    ) -> Result<Option<SecretRecord>, AppError> {
        let sql = format!(
            "SELECT * FROM {} WHERE owner_id = $1 AND key_name = $2",
            scope.table()
        );

        sqlx::query_as::<Postgres, SecretRecord>(&sql)
            .bind(scope.owner_id())
            .bind(key_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, scope = %scope, "Failed to get secret");
                AppError::Database(e)
            })
    }
}
