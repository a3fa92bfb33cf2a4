//! Encrypted credentials and their resolution for a principal.

mod resolver;
mod secret_store;

pub use resolver::{CredentialResolver, ResolvedCredential, ResolvedCredentials};
pub use secret_store::SecretStore;
