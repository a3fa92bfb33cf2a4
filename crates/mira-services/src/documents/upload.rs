use std::sync::Arc;

use mira_core::models::{Document, NewDocument, Principal, UploadReceipt};
use mira_core::AppError;
use mira_db::DocumentRepositoryTrait;
use mira_processing::content_sha256;
use mira_storage::{content_key, sanitize_filename, Storage};
use uuid::Uuid;

const LIST_LIMIT: i64 = 500;

/// Stores uploaded bytes and records them in the ledger.
#[derive(Clone)]
pub struct DocumentService {
    storage: Arc<dyn Storage>,
    documents: Arc<dyn DocumentRepositoryTrait>,
}

impl DocumentService {
    pub fn new(storage: Arc<dyn Storage>, documents: Arc<dyn DocumentRepositoryTrait>) -> Self {
        Self { storage, documents }
    }

    /// Store `bytes` under `{tenant}/{principal}/{sha256}/{filename}` and
    /// append a ledger row with its audit entry. Identical bytes share one
    /// stored object; every upload gets its own ledger row.
    #[tracing::instrument(skip(self, principal, bytes), fields(user_id = %principal.id, tenant_id = %principal.tenant_id))]
    pub async fn upload(
        &self,
        principal: &Principal,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadReceipt, AppError> {
        let start = std::time::Instant::now();
        let filename = sanitize_filename(filename);
        let size = bytes.len() as i64;
        let sha256 = content_sha256(&bytes);
        let key = content_key(principal.tenant_id, principal.id, &sha256, &filename);

        let stored = self.storage.put(&key, bytes).await?;

        let created = self
            .documents
            .create_with_audit(NewDocument {
                tenant_id: principal.tenant_id,
                principal_id: principal.id,
                filename: filename.clone(),
                path: stored.location.clone(),
                size,
                sha256,
            })
            .await;

        // A blob written by this call has no ledger row yet; one that already
        // existed belongs to earlier uploads and stays.
        let document = match created {
            Ok(document) => document,
            Err(e) => {
                if stored.written {
                    if let Err(cleanup) = self.storage.delete(&key).await {
                        tracing::warn!(error = %cleanup, key = %key, "Failed to remove orphaned upload");
                    }
                }
                return Err(e);
            }
        };

        tracing::info!(
            doc_id = %document.id,
            filename = %filename,
            size_bytes = size,
            written = stored.written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Document uploaded"
        );
        Ok(UploadReceipt::from(&document))
    }

    /// Documents of a tenant, newest first.
    pub async fn list_documents(&self, tenant_id: Uuid) -> Result<Vec<Document>, AppError> {
        self.documents.list_by_tenant(tenant_id, LIST_LIMIT).await
    }
}
