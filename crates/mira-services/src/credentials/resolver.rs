use mira_core::models::{CredentialKey, Principal, SecretScope};

use super::SecretStore;

/// A credential value and the scope that supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    pub value: String,
    pub scope: SecretScope,
}

/// Effective credentials of one principal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub openai_api_key: Option<ResolvedCredential>,
    pub trello_api_key: Option<ResolvedCredential>,
    pub trello_token: Option<ResolvedCredential>,
}

impl ResolvedCredentials {
    pub fn openai_api_key(&self) -> Option<&str> {
        self.openai_api_key.as_ref().map(|c| c.value.as_str())
    }

    /// Trello key and token, only when both are present.
    pub fn trello(&self) -> Option<(&str, &str)> {
        match (&self.trello_api_key, &self.trello_token) {
            (Some(key), Some(token)) => Some((key.value.as_str(), token.value.as_str())),
            _ => None,
        }
    }
}

/// Resolves credentials for a principal: the tenant's value wins, then the
/// principal's own, else none. Lookup failures resolve to none.
#[derive(Clone)]
pub struct CredentialResolver {
    store: SecretStore,
}

impl CredentialResolver {
    pub fn new(store: SecretStore) -> Self {
        Self { store }
    }

    pub async fn resolve(
        &self,
        principal: &Principal,
        key: CredentialKey,
    ) -> Option<ResolvedCredential> {
        let scopes = [
            SecretScope::Tenant(principal.tenant_id),
            SecretScope::Principal(principal.id),
        ];
        for scope in scopes {
            match self.store.get(scope, key.as_str()).await {
                Ok(Some(value)) if !value.is_empty() => {
                    tracing::debug!(key = %key, scope = %scope.label(), "Credential resolved");
                    return Some(ResolvedCredential { value, scope });
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(key = %key, scope = %scope.label(), error = %e, "Credential lookup failed; treating as unset");
                    return None;
                }
            }
        }
        None
    }

    pub async fn resolve_all(&self, principal: &Principal) -> ResolvedCredentials {
        ResolvedCredentials {
            openai_api_key: self.resolve(principal, CredentialKey::OpenAiApiKey).await,
            trello_api_key: self.resolve(principal, CredentialKey::TrelloApiKey).await,
            trello_token: self.resolve(principal, CredentialKey::TrelloToken).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{principal_in, test_cipher, InMemorySecretRepository};
    use mira_core::models::Role;
    use std::sync::Arc;
    use uuid::Uuid;

    fn setup() -> (Arc<InMemorySecretRepository>, SecretStore, CredentialResolver) {
        let repo = Arc::new(InMemorySecretRepository::default());
        let store = SecretStore::new(repo.clone(), test_cipher());
        let resolver = CredentialResolver::new(store.clone());
        (repo, store, resolver)
    }

    #[tokio::test]
    async fn tenant_value_wins_over_user_value() {
        let (_, store, resolver) = setup();
        let user = principal_in(Uuid::new_v4(), Role::Member);

        store
            .set(SecretScope::Tenant(user.tenant_id), "openai_api_key", "sk-abc")
            .await
            .unwrap();
        store
            .set(SecretScope::Principal(user.id), "openai_api_key", "sk-xyz")
            .await
            .unwrap();

        let resolved = resolver.resolve(&user, CredentialKey::OpenAiApiKey).await.unwrap();
        assert_eq!(resolved.value, "sk-abc");
        assert_eq!(resolved.scope, SecretScope::Tenant(user.tenant_id));
    }

    #[tokio::test]
    async fn user_value_used_when_tenant_has_none() {
        let (_, store, resolver) = setup();
        let user = principal_in(Uuid::new_v4(), Role::Member);
        store
            .set(SecretScope::Principal(user.id), "trello_api_key", "user-key")
            .await
            .unwrap();

        let resolved = resolver.resolve(&user, CredentialKey::TrelloApiKey).await.unwrap();
        assert_eq!(resolved.value, "user-key");
        assert_eq!(resolved.scope, SecretScope::Principal(user.id));
    }

    #[tokio::test]
    async fn absent_everywhere_is_none() {
        let (_, _, resolver) = setup();
        let user = principal_in(Uuid::new_v4(), Role::Admin);
        assert_eq!(resolver.resolve(&user, CredentialKey::TrelloToken).await, None);
    }

    #[tokio::test]
    async fn store_failure_resolves_to_none() {
        let (repo, store, resolver) = setup();
        let user = principal_in(Uuid::new_v4(), Role::Member);
        store
            .set(SecretScope::Principal(user.id), "openai_api_key", "sk-xyz")
            .await
            .unwrap();
        repo.fail_reads(true);

        assert_eq!(resolver.resolve(&user, CredentialKey::OpenAiApiKey).await, None);
    }

    #[tokio::test]
    async fn trello_pair_requires_both_values() {
        let (_, store, resolver) = setup();
        let user = principal_in(Uuid::new_v4(), Role::Member);
        store
            .set(SecretScope::Tenant(user.tenant_id), "trello_api_key", "k")
            .await
            .unwrap();

        let creds = resolver.resolve_all(&user).await;
        assert_eq!(creds.trello(), None);

        store
            .set(SecretScope::Principal(user.id), "trello_token", "t")
            .await
            .unwrap();
        let creds = resolver.resolve_all(&user).await;
        assert_eq!(creds.trello(), Some(("k", "t")));
        assert_eq!(creds.openai_api_key(), None);
    }
}
