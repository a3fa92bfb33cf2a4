//! Repository trait abstractions
//!
//! The services layer depends on these traits rather than on the concrete
//! Postgres repositories, so secret, login and upload flows can be tested
//! against in-memory doubles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mira_core::models::{
    AuditLogEntry, Document, NewAuditLogEntry, NewDocument, Principal, Role, SecretRecord,
    SecretScope,
};
use mira_core::AppError;
use uuid::Uuid;

use crate::db::{
    AuditRepository, DocumentRepository, LoginTokenRepository, PrincipalRepository,
    SecretRepository,
};

/// Encrypted secret rows keyed by (scope, key name).
#[async_trait]
pub trait SecretRepositoryTrait: Send + Sync {
    async fn upsert(
        &self,
        scope: SecretScope,
        key_name: &str,
        encrypted_value: &str,
    ) -> Result<SecretRecord, AppError>;

    async fn get(&self, scope: SecretScope, key_name: &str)
        -> Result<Option<SecretRecord>, AppError>;
}

/// Principal lookup and creation.
#[async_trait]
pub trait PrincipalRepositoryTrait: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Principal>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AppError>;

    /// Create the principal (and tenant) when absent; the first member of a
    /// tenant is `admin`.
    async fn get_or_create(
        &self,
        email: &str,
        company_name: &str,
        domain: Option<&str>,
    ) -> Result<Principal, AppError>;

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Principal, AppError>;
}

/// Hashed single-use login tokens.
#[async_trait]
pub trait LoginTokenRepositoryTrait: Send + Sync {
    async fn create(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Atomically mark a live token used, returning its owner.
    async fn consume(&self, token_hash: &str) -> Result<Option<Uuid>, AppError>;
}

/// Document ledger.
#[async_trait]
pub trait DocumentRepositoryTrait: Send + Sync {
    async fn create_with_audit(&self, doc: NewDocument) -> Result<Document, AppError>;

    async fn list_by_tenant(&self, tenant_id: Uuid, limit: i64)
        -> Result<Vec<Document>, AppError>;
}

/// Audit log writer.
#[async_trait]
pub trait AuditRepositoryTrait: Send + Sync {
    async fn append(&self, entry: &NewAuditLogEntry) -> Result<AuditLogEntry, AppError>;
}

#[async_trait]
impl SecretRepositoryTrait for SecretRepository {
    async fn upsert(
        &self,
        scope: SecretScope,
        key_name: &str,
        encrypted_value: &str,
    ) -> Result<SecretRecord, AppError> {
        SecretRepository::upsert(self, scope, key_name, encrypted_value).await
    }

    async fn get(
        &self,
        scope: SecretScope,
        key_name: &str,
    ) -> Result<Option<SecretRecord>, AppError> {
        SecretRepository::get(self, scope, key_name).await
    }
}

#[async_trait]
impl PrincipalRepositoryTrait for PrincipalRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Principal>, AppError> {
        PrincipalRepository::get(self, id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AppError> {
        PrincipalRepository::find_by_email(self, email).await
    }

    async fn get_or_create(
        &self,
        email: &str,
        company_name: &str,
        domain: Option<&str>,
    ) -> Result<Principal, AppError> {
        PrincipalRepository::get_or_create(self, email, company_name, domain).await
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Principal, AppError> {
        PrincipalRepository::set_role(self, id, role).await
    }
}

#[async_trait]
impl LoginTokenRepositoryTrait for LoginTokenRepository {
    async fn create(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        LoginTokenRepository::create(self, user_id, token_hash, expires_at)
            .await
            .map(|_| ())
    }

    async fn consume(&self, token_hash: &str) -> Result<Option<Uuid>, AppError> {
        LoginTokenRepository::consume(self, token_hash).await
    }
}

#[async_trait]
impl DocumentRepositoryTrait for DocumentRepository {
    async fn create_with_audit(&self, doc: NewDocument) -> Result<Document, AppError> {
        DocumentRepository::create_with_audit(self, doc).await
    }

    async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Document>, AppError> {
        DocumentRepository::list_by_tenant(self, tenant_id, limit).await
    }
}

#[async_trait]
impl AuditRepositoryTrait for AuditRepository {
    async fn append(&self, entry: &NewAuditLogEntry) -> Result<AuditLogEntry, AppError> {
        AuditRepository::append(self, entry).await
    }
}
