//! Database repositories
//!
//! Organized into identity/ (tenants, principals, login tokens, secrets) and
//! documents/ (ledger, audit log, diagnostics).
//
// Identity repositories
pub mod identity;
//
// Document ledger and audit repositories
pub mod documents;
//
// Transaction utilities
pub mod transaction;

pub use documents::{database_size, AuditRepository, DocumentRepository};
pub use identity::{LoginTokenRepository, PrincipalRepository, SecretRepository, TenantRepository};
