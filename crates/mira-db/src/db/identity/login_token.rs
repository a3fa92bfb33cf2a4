use chrono::{DateTime, Utc};
use mira_core::models::LoginToken;
use mira_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

#[derive(Clone)]
pub struct LoginTokenRepository {
    pool: PgPool,
}

impl LoginTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, token_hash), fields(db.table = "login_tokens", db.operation = "insert"))]
    pub async fn create(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<LoginToken, AppError> {
        sqlx::query_as::<Postgres, LoginToken>(
            r#"
            INSERT INTO login_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user_id, "Failed to create login token");
            AppError::Database(e)
        })
    }

    /// Mark the token used and return its owner, in one statement. Unknown,
    /// expired and already-used tokens all yield `None`.
    #[tracing::instrument(skip(self, token_hash), fields(db.table = "login_tokens", db.operation = "update"))]
    pub async fn consume(&self, token_hash: &str) -> Result<Option<Uuid>, AppError> {
        sqlx::query_scalar::<Postgres, Uuid>(
            r#"
            UPDATE login_tokens
            SET used_at = now()
            WHERE token_hash = $1
              AND used_at IS NULL
              AND expires_at > now()
            RETURNING user_id
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to consume login token");
            AppError::Database(e)
        })
    }

    /// Remove tokens that can no longer be consumed.
    #[tracing::instrument(skip(self), fields(db.table = "login_tokens", db.operation = "delete"))]
    pub async fn delete_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM login_tokens WHERE expires_at <= now() OR used_at IS NOT NULL",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to delete expired login tokens");
            AppError::Database(e)
        })?;

        Ok(result.rows_affected())
    }
}
