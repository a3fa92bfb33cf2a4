//! Document ledger, audit log and storage diagnostics

pub mod audit;
pub mod diagnostics;
pub mod document;

pub use audit::AuditRepository;
pub use diagnostics::database_size;
pub use document::DocumentRepository;
