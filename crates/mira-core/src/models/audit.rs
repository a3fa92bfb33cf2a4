use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const ACTION_UPLOAD_DOCUMENT: &str = "upload_document";
pub const ACTION_SET_ROLE: &str = "set_role";

/// Append-only record of a sensitive action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuditLogEntry {
    pub id: Uuid,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "company_id"))]
    pub tenant_id: Uuid,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "user_id"))]
    pub principal_id: Uuid,
    pub action: String,
    pub doc_id: Option<Uuid>,
    pub meta_json: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditLogEntry {
    pub tenant_id: Uuid,
    pub principal_id: Uuid,
    pub action: String,
    pub doc_id: Option<Uuid>,
    pub meta_json: Option<Value>,
}
