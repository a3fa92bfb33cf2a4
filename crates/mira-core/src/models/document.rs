use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger entry for an uploaded file. Rows are immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Document {
    pub id: Uuid,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "company_id"))]
    pub tenant_id: Uuid,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "user_id"))]
    pub principal_id: Uuid,
    pub filename: String,
    pub path: String,
    pub size: i64,
    pub sha256: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Values needed to insert a ledger row.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub tenant_id: Uuid,
    pub principal_id: Uuid,
    pub filename: String,
    pub path: String,
    pub size: i64,
    pub sha256: String,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub doc_id: Uuid,
    pub filename: String,
    pub path: String,
    pub sha256: String,
    pub size: i64,
}

impl From<&Document> for UploadReceipt {
    fn from(doc: &Document) -> Self {
        Self {
            doc_id: doc.id,
            filename: doc.filename.clone(),
            path: doc.path.clone(),
            sha256: doc.sha256.clone(),
            size: doc.size,
        }
    }
}
