//! Document upload into content-addressed storage plus the ledger.

mod upload;

pub use upload::DocumentService;
