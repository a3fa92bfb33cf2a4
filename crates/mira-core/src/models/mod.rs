//! Data models for the application
//!
//! Each sub-module represents one entity of the multi-tenant schema or a
//! shared value type used by the ingestion and agent layers.

mod artifact;
mod audit;
mod document;
mod login_token;
mod principal;
mod secret;
mod tenant;

pub use artifact::*;
pub use audit::*;
pub use document::*;
pub use login_token::*;
pub use principal::*;
pub use secret::*;
pub use tenant::*;
