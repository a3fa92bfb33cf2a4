//! Service wiring for the `mira` binary.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use mira_agent::AgentContext;
use mira_core::models::{normalize_email, Principal};
use mira_core::{Config, EncryptionService};
use mira_db::{
    AuditRepository, DocumentRepository, LoginTokenRepository, PrincipalRepository,
    SecretRepository,
};
use mira_processing::{ArtifactWriter, ChunkConfig, UploadedFile};
use mira_services::{AuthService, CredentialResolver, DocumentService, SecretStore};
use sqlx::PgPool;

/// Everything a command needs, built once from configuration.
pub struct App {
    pub config: Config,
    pub pool: PgPool,
    pub principals: PrincipalRepository,
    pub auth: AuthService,
    pub secrets: SecretStore,
    pub resolver: CredentialResolver,
}

impl App {
    /// Connect to the database and build the identity and secret services.
    /// Fails fast when `DATABASE_URL`, `SECRETS_MASTER_KEY` or `AUTH_SECRET`
    /// is missing.
    pub async fn connect(config: Config) -> Result<Self> {
        let cipher = EncryptionService::from_config(&config)?;
        let pool = mira_db::connect(&config).await?;

        let principals = PrincipalRepository::new(pool.clone());
        let auth = AuthService::new(
            Arc::new(principals.clone()),
            Arc::new(LoginTokenRepository::new(pool.clone())),
            Arc::new(AuditRepository::new(pool.clone())),
            &config,
        )?;
        let secrets = SecretStore::new(Arc::new(SecretRepository::new(pool.clone())), cipher);
        let resolver = CredentialResolver::new(secrets.clone());

        Ok(Self {
            config,
            pool,
            principals,
            auth,
            secrets,
            resolver,
        })
    }

    /// Principal for an email that has already signed in at least once.
    pub async fn principal(&self, email: &str) -> Result<Principal> {
        let email = normalize_email(email);
        self.principals
            .find_by_email(&email)
            .await?
            .with_context(|| format!("No user {}; request a login link first", email))
    }

    /// Document upload service over the configured storage backend.
    pub async fn documents(&self) -> Result<DocumentService> {
        let storage = mira_storage::create_storage(&self.config)
            .await
            .context("Failed to initialize document storage")?;
        Ok(DocumentService::new(
            storage,
            Arc::new(DocumentRepository::new(self.pool.clone())),
        ))
    }

    /// Agent collaborators for whichever credentials resolve for `principal`.
    pub async fn agent_context(&self, principal: &Principal) -> AgentContext {
        let credentials = self.resolver.resolve_all(principal).await;
        AgentContext::from_credentials(&self.config, &credentials)
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
        }
    }

    pub fn artifact_writer(&self) -> ArtifactWriter {
        ArtifactWriter::new(self.config.outputs_dir.clone())
    }
}

/// Read files from disk, keeping only the file name.
pub async fn read_files(paths: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        files.push(UploadedFile::new(name, bytes));
    }
    Ok(files)
}
