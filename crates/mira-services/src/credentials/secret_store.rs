use std::sync::Arc;

use mira_core::models::SecretScope;
use mira_core::{AppError, EncryptionService};
use mira_db::SecretRepositoryTrait;

/// Encrypts credential values on write and decrypts them on read.
#[derive(Clone)]
pub struct SecretStore {
    repository: Arc<dyn SecretRepositoryTrait>,
    cipher: EncryptionService,
}

impl SecretStore {
    pub fn new(repository: Arc<dyn SecretRepositoryTrait>, cipher: EncryptionService) -> Self {
        Self { repository, cipher }
    }

    /// Upsert a value for (scope, key). A second call overwrites in place.
    #[tracing::instrument(skip(self, plaintext), fields(scope = %scope.label(), owner_id = %scope.owner_id()))]
    pub async fn set(
        &self,
        scope: SecretScope,
        key_name: &str,
        plaintext: &str,
    ) -> Result<(), AppError> {
        let key_name = key_name.trim();
        if key_name.is_empty() {
            return Err(AppError::InvalidInput("Secret key name is empty".to_string()));
        }
        let encrypted = self.cipher.encrypt(plaintext)?;
        self.repository.upsert(scope, key_name, &encrypted).await?;
        tracing::info!(key_name = %key_name, "Secret saved");
        Ok(())
    }

    /// Read and decrypt a value. A value that fails to decrypt is reported as
    /// absent. Key names are trimmed as in [`SecretStore::set`].
    #[tracing::instrument(skip(self), fields(scope = %scope.label(), owner_id = %scope.owner_id()))]
    pub async fn get(&self, scope: SecretScope, key_name: &str) -> Result<Option<String>, AppError> {
        let key_name = key_name.trim();
        let Some(record) = self.repository.get(scope, key_name).await? else {
            return Ok(None);
        };
        match self.cipher.decrypt(&record.encrypted_value) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key_name = %key_name, error = %e, "Stored secret could not be decrypted; treating as absent");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_cipher, InMemorySecretRepository};
    use uuid::Uuid;

    fn store(repo: &Arc<InMemorySecretRepository>) -> SecretStore {
        SecretStore::new(repo.clone(), test_cipher())
    }

    #[tokio::test]
    async fn set_twice_keeps_one_row_with_latest_value() {
        let repo = Arc::new(InMemorySecretRepository::default());
        let store = store(&repo);
        let scope = SecretScope::Principal(Uuid::new_v4());

        store.set(scope, "openai_api_key", "sk-first").await.unwrap();
        store.set(scope, "openai_api_key", "sk-second").await.unwrap();

        assert_eq!(repo.row_count(), 1);
        assert_eq!(
            store.get(scope, "openai_api_key").await.unwrap().as_deref(),
            Some("sk-second")
        );
    }

    #[tokio::test]
    async fn unicode_round_trip_and_ciphertext_at_rest() {
        let repo = Arc::new(InMemorySecretRepository::default());
        let store = store(&repo);
        let scope = SecretScope::Tenant(Uuid::new_v4());

        for value in ["", "トークン🔑", "with\nnewline", "ascii"] {
            store.set(scope, "trello_token", value).await.unwrap();
            assert_eq!(store.get(scope, "trello_token").await.unwrap().as_deref(), Some(value));
        }
        let raw = repo.raw_value(scope, "trello_token").unwrap();
        assert_ne!(raw, "ascii");
    }

    #[tokio::test]
    async fn scopes_do_not_collide() {
        let repo = Arc::new(InMemorySecretRepository::default());
        let store = store(&repo);
        let id = Uuid::new_v4();

        store.set(SecretScope::Tenant(id), "openai_api_key", "company").await.unwrap();
        store.set(SecretScope::Principal(id), "openai_api_key", "user").await.unwrap();

        assert_eq!(
            store.get(SecretScope::Tenant(id), "openai_api_key").await.unwrap().as_deref(),
            Some("company")
        );
        assert_eq!(
            store.get(SecretScope::Principal(id), "openai_api_key").await.unwrap().as_deref(),
            Some("user")
        );
    }

    #[tokio::test]
    async fn undecryptable_value_reads_as_absent() {
        let repo = Arc::new(InMemorySecretRepository::default());
        let scope = SecretScope::Principal(Uuid::new_v4());
        store(&repo).set(scope, "openai_api_key", "sk-abc").await.unwrap();

        let rotated = SecretStore::new(
            repo.clone(),
            EncryptionService::from_key_bytes(&[7u8; 32]).unwrap(),
        );
        assert_eq!(rotated.get(scope, "openai_api_key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_value_is_none() {
        let repo = Arc::new(InMemorySecretRepository::default());
        let scope = SecretScope::Principal(Uuid::new_v4());
        assert_eq!(store(&repo).get(scope, "openai_api_key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn key_names_are_trimmed_on_read_and_write() {
        let repo = Arc::new(InMemorySecretRepository::default());
        let store = store(&repo);
        let scope = SecretScope::Principal(Uuid::new_v4());

        store.set(scope, " trello_token ", "tok").await.unwrap();

        assert_eq!(store.get(scope, " trello_token ").await.unwrap().as_deref(), Some("tok"));
        assert_eq!(store.get(scope, "trello_token").await.unwrap().as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn empty_key_name_is_rejected() {
        let repo = Arc::new(InMemorySecretRepository::default());
        let scope = SecretScope::Principal(Uuid::new_v4());
        assert!(matches!(
            store(&repo).set(scope, "  ", "v").await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
