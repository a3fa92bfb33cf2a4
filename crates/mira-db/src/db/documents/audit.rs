use mira_core::models::{AuditLogEntry, NewAuditLogEntry};
use mira_core::AppError;
use sqlx::{PgConnection, PgPool, Postgres};
use uuid::Uuid;

/// Append-only audit log. There is no update or delete.
#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, entry), fields(db.table = "audit_logs", db.operation = "insert", action = %entry.action))]
    pub async fn append(&self, entry: &NewAuditLogEntry) -> Result<AuditLogEntry, AppError> {
        let mut conn = self.pool.acquire().await.map_err(AppError::Database)?;
        append_in(&mut conn, entry).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "audit_logs", db.operation = "select"))]
    pub async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        sqlx::query_as::<Postgres, AuditLogEntry>(
            r#"
            SELECT * FROM audit_logs
            WHERE company_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, tenant_id = %tenant_id, "Failed to list audit log");
            AppError::Database(e)
        })
    }
}

pub(crate) async fn append_in(
    conn: &mut PgConnection,
    entry: &NewAuditLogEntry,
) -> Result<AuditLogEntry, AppError> {
    sqlx::query_as::<Postgres, AuditLogEntry>(
        r#"
        INSERT INTO audit_logs (company_id, user_id, action, doc_id, meta_json)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(entry.tenant_id)
    .bind(entry.principal_id)
    .bind(&entry.action)
    .bind(entry.doc_id)
    .bind(&entry.meta_json)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, action = %entry.action, "Failed to append audit log entry");
        AppError::Database(e)
    })
}
