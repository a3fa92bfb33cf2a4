//! Tenants, principals, login tokens and encrypted secrets

pub mod login_token;
pub mod principal;
pub mod secret;
pub mod tenant;

pub use login_token::LoginTokenRepository;
pub use principal::PrincipalRepository;
pub use secret::SecretRepository;
pub use tenant::TenantRepository;
