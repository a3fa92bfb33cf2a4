use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Namespace a secret belongs to. Principal and tenant ids are drawn from
/// disjoint tables so the two scopes never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "owner_id", rename_all = "lowercase")]
pub enum SecretScope {
    Principal(Uuid),
    Tenant(Uuid),
}

impl SecretScope {
    pub fn owner_id(&self) -> Uuid {
        match self {
            SecretScope::Principal(id) | SecretScope::Tenant(id) => *id,
        }
    }

    /// Backing table for this scope.
    pub fn table(&self) -> &'static str {
        match self {
            SecretScope::Principal(_) => "user_secrets",
            SecretScope::Tenant(_) => "company_secrets",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SecretScope::Principal(_) => "user",
            SecretScope::Tenant(_) => "company",
        }
    }
}

impl fmt::Display for SecretScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.label(), self.owner_id())
    }
}

/// Credential names understood by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKey {
    OpenAiApiKey,
    TrelloApiKey,
    TrelloToken,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 3] = [
        CredentialKey::OpenAiApiKey,
        CredentialKey::TrelloApiKey,
        CredentialKey::TrelloToken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::OpenAiApiKey => "openai_api_key",
            CredentialKey::TrelloApiKey => "trello_api_key",
            CredentialKey::TrelloToken => "trello_token",
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CredentialKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| format!("unknown credential key: {}", s))
    }
}

/// Stored secret row. `encrypted_value` is never plaintext.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SecretRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub key_name: String,
    pub encrypted_value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
