//! Mira services
//!
//! Stateful services and external collaborators: the secret store and
//! credential resolver, magic-link login, document upload, the OpenAI and
//! Trello clients, and the session vector index with its retrieval engine.

pub mod auth;
pub mod credentials;
pub mod documents;
pub mod providers;
pub mod retrieval;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use auth::{AuthService, IssuedLoginToken, Mailer, SmtpMailer};
pub use credentials::{CredentialResolver, ResolvedCredential, ResolvedCredentials, SecretStore};
pub use documents::DocumentService;
pub use providers::{
    BoardClient, BoardError, EmbeddingProvider, LlmProvider, OpenAiChatClient,
    OpenAiEmbeddingClient, ProviderError, TrelloClient,
};
pub use retrieval::{Indexer, RetrievalEngine, SearchHit, SearchOutcome, VectorIndex};
