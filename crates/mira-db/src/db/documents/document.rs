use mira_core::models::{Document, NewAuditLogEntry, NewDocument, ACTION_UPLOAD_DOCUMENT};
use mira_core::AppError;
use serde_json::json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::audit;
use crate::db::transaction::with_transaction;

#[derive(Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a ledger row and its `upload_document` audit entry in one
    /// transaction.
    #[tracing::instrument(
        skip(self, doc),
        fields(db.table = "documents", db.operation = "insert", tenant_id = %doc.tenant_id)
    )]
    pub async fn create_with_audit(&self, doc: NewDocument) -> Result<Document, AppError> {
        let document = with_transaction(&self.pool, move |conn| {
            Box::pin(async move {
                let document = sqlx::query_as::<Postgres, Document>(
                    r#"
                    INSERT INTO documents (company_id, user_id, filename, path, size, sha256)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING *
                    "#,
                )
                .bind(doc.tenant_id)
                .bind(doc.principal_id)
                .bind(&doc.filename)
                .bind(&doc.path)
                .bind(doc.size)
                .bind(&doc.sha256)
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to insert document");
                    AppError::Database(e)
                })?;

                let entry = NewAuditLogEntry {
                    tenant_id: document.tenant_id,
                    principal_id: document.principal_id,
                    action: ACTION_UPLOAD_DOCUMENT.to_string(),
                    doc_id: Some(document.id),
                    meta_json: Some(json!({
                        "filename": document.filename,
                        "path": document.path,
                    })),
                };
                audit::append_in(conn, &entry).await?;

                Ok(document)
            })
        })
        .await?;

        tracing::info!(
            doc_id = %document.id,
            filename = %document.filename,
            size_bytes = document.size,
            "Document recorded"
        );

        Ok(document)
    }

    /// Documents of a tenant, newest first.
    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select"))]
    pub async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Document>, AppError> {
        sqlx::query_as::<Postgres, Document>(
            r#"
            SELECT * FROM documents
            WHERE company_id = $1
            ORDER BY uploaded_at DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, tenant_id = %tenant_id, "Failed to list documents");
            AppError::Database(e)
        })
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "count"))]
    pub async fn count_all(&self) -> Result<i64, AppError> {
        sqlx::query_scalar::<Postgres, i64>("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to count documents");
                AppError::Database(e)
            })
    }

    /// Most recent documents across all tenants, for diagnostics.
    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select"))]
    pub async fn recent(&self, limit: i64) -> Result<Vec<Document>, AppError> {
        sqlx::query_as::<Postgres, Document>(
            "SELECT * FROM documents ORDER BY uploaded_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list recent documents");
            AppError::Database(e)
        })
    }
}
