use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

use mira_core::models::{
    company_name_from_domain, email_domain, normalize_email, NewAuditLogEntry, Principal, Role,
    ACTION_SET_ROLE,
};
use mira_core::{AppError, Config};
use mira_db::{AuditRepositoryTrait, LoginTokenRepositoryTrait, PrincipalRepositoryTrait};

use super::email::{magic_link_body, Mailer, MAGIC_LINK_SUBJECT};

type HmacSha256 = Hmac<Sha256>;

const TOKEN_BYTES: usize = 32;

/// A freshly issued login token. The raw value exists only here and in the
/// magic link; the database keeps its HMAC.
#[derive(Debug, Clone)]
pub struct IssuedLoginToken {
    pub principal: Principal,
    pub raw_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    principals: Arc<dyn PrincipalRepositoryTrait>,
    tokens: Arc<dyn LoginTokenRepositoryTrait>,
    audit: Arc<dyn AuditRepositoryTrait>,
    auth_secret: String,
    ttl_minutes: i64,
    app_base_url: String,
    default_company_name: String,
}

impl AuthService {
    /// `AUTH_SECRET` must be configured.
    pub fn new(
        principals: Arc<dyn PrincipalRepositoryTrait>,
        tokens: Arc<dyn LoginTokenRepositoryTrait>,
        audit: Arc<dyn AuditRepositoryTrait>,
        config: &Config,
    ) -> Result<Self, AppError> {
        Ok(Self {
            principals,
            tokens,
            audit,
            auth_secret: config.require_auth_secret()?.to_string(),
            ttl_minutes: config.login_token_ttl_minutes,
            app_base_url: config.app_base_url.clone(),
            default_company_name: config.default_company_name.clone(),
        })
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.ttl_minutes
    }

    /// Hex HMAC-SHA256 of a raw token under `AUTH_SECRET`.
    pub fn hash_token(&self, raw_token: &str) -> Result<String, AppError> {
        let mut mac = HmacSha256::new_from_slice(self.auth_secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("Invalid HMAC key: {}", e)))?;
        mac.update(raw_token.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Create the principal if needed and issue a single-use token.
    #[tracing::instrument(skip(self, email))]
    pub async fn generate_login_token(&self, email: &str) -> Result<IssuedLoginToken, AppError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::InvalidInput("A valid email address is required".to_string()));
        }

        let domain = email_domain(&email);
        let company_name = domain
            .as_deref()
            .and_then(company_name_from_domain)
            .unwrap_or_else(|| self.default_company_name.clone());

        let principal = self
            .principals
            .get_or_create(&email, &company_name, domain.as_deref())
            .await?;

        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let raw_token = general_purpose::URL_SAFE_NO_PAD.encode(bytes);
        let expires_at = Utc::now() + Duration::minutes(self.ttl_minutes);

        self.tokens
            .create(principal.id, &self.hash_token(&raw_token)?, expires_at)
            .await?;

        tracing::info!(user_id = %principal.id, tenant_id = %principal.tenant_id, "Login token issued");
        Ok(IssuedLoginToken {
            principal,
            raw_token,
            expires_at,
        })
    }

    pub fn build_magic_link(&self, raw_token: &str) -> String {
        format!("{}?login_token={}", self.app_base_url, raw_token)
    }

    /// Email the magic link for an issued token.
    pub async fn send_magic_link(
        &self,
        mailer: &dyn Mailer,
        issued: &IssuedLoginToken,
    ) -> Result<(), AppError> {
        let link = self.build_magic_link(&issued.raw_token);
        mailer
            .send(
                &issued.principal.email,
                MAGIC_LINK_SUBJECT,
                &magic_link_body(&link, self.ttl_minutes),
            )
            .await
    }

    /// Consume a raw token and return its principal. Unknown, expired and
    /// already-used tokens all fail the same way.
    #[tracing::instrument(skip(self, raw_token))]
    pub async fn verify_login_token(&self, raw_token: &str) -> Result<Principal, AppError> {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() {
            return Err(AppError::LoginFailed);
        }
        let hash = self.hash_token(raw_token)?;

        let user_id = match self.tokens.consume(&hash).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::debug!("Login token rejected");
                return Err(AppError::LoginFailed);
            }
            Err(e) => {
                tracing::error!(error = %e, "Login token lookup failed");
                return Err(AppError::LoginFailed);
            }
        };

        match self.principals.get(user_id).await {
            Ok(Some(principal)) => {
                tracing::info!(user_id = %principal.id, "Login succeeded");
                Ok(principal)
            }
            Ok(None) => Err(AppError::LoginFailed),
            Err(e) => {
                tracing::error!(error = %e, "Principal lookup after login failed");
                Err(AppError::LoginFailed)
            }
        }
    }

    /// Change a member's role. Only an admin of the same tenant may do this.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn set_role(
        &self,
        actor: &Principal,
        target_id: Uuid,
        role: Role,
    ) -> Result<Principal, AppError> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden("Only administrators can change roles".to_string()));
        }
        let target = self
            .principals
            .get(target_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", target_id)))?;
        if target.tenant_id != actor.tenant_id {
            return Err(AppError::Forbidden(
                "Users can only be managed within their own company".to_string(),
            ));
        }

        let updated = self.principals.set_role(target_id, role).await?;
        self.audit
            .append(&NewAuditLogEntry {
                tenant_id: actor.tenant_id,
                principal_id: actor.id,
                action: ACTION_SET_ROLE.to_string(),
                doc_id: None,
                meta_json: Some(serde_json::json!({
                    "target_user_id": target_id,
                    "role": role.as_str(),
                })),
            })
            .await?;
        tracing::info!(target_id = %target_id, role = %role, "Role changed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        InMemoryAuditRepository, InMemoryLoginTokenRepository, InMemoryPrincipalRepository,
        RecordingMailer,
    };

    struct Harness {
        auth: AuthService,
        principals: Arc<InMemoryPrincipalRepository>,
        tokens: Arc<InMemoryLoginTokenRepository>,
        audit: Arc<InMemoryAuditRepository>,
    }

    fn harness() -> Harness {
        let mut config = mira_core::Config::for_tests();
        config.auth_secret = Some("test-auth-secret".to_string());
        let principals = Arc::new(InMemoryPrincipalRepository::default());
        let tokens = Arc::new(InMemoryLoginTokenRepository::default());
        let audit = Arc::new(InMemoryAuditRepository::default());
        let auth = AuthService::new(principals.clone(), tokens.clone(), audit.clone(), &config)
            .unwrap();
        Harness {
            auth,
            principals,
            tokens,
            audit,
        }
    }

    #[tokio::test]
    async fn token_is_consumed_at_most_once() {
        let h = harness();
        let issued = h.auth.generate_login_token("Dana@Acme.com ").await.unwrap();
        assert_eq!(issued.principal.email, "dana@acme.com");

        let principal = h.auth.verify_login_token(&issued.raw_token).await.unwrap();
        assert_eq!(principal.id, issued.principal.id);

        assert!(matches!(
            h.auth.verify_login_token(&issued.raw_token).await,
            Err(AppError::LoginFailed)
        ));
    }

    #[tokio::test]
    async fn expired_token_fails_even_if_unused() {
        let h = harness();
        let issued = h.auth.generate_login_token("dana@acme.com").await.unwrap();
        h.tokens.expire_all();

        assert!(matches!(
            h.auth.verify_login_token(&issued.raw_token).await,
            Err(AppError::LoginFailed)
        ));
    }

    #[tokio::test]
    async fn unknown_and_empty_tokens_fail() {
        let h = harness();
        assert!(matches!(
            h.auth.verify_login_token("nope").await,
            Err(AppError::LoginFailed)
        ));
        assert!(matches!(
            h.auth.verify_login_token("   ").await,
            Err(AppError::LoginFailed)
        ));
    }

    #[tokio::test]
    async fn raw_token_is_not_stored() {
        let h = harness();
        let issued = h.auth.generate_login_token("dana@acme.com").await.unwrap();
        let stored = h.tokens.hashes();
        assert_eq!(stored.len(), 1);
        assert_ne!(stored[0], issued.raw_token);
        assert_eq!(stored[0], h.auth.hash_token(&issued.raw_token).unwrap());
        assert_eq!(stored[0].len(), 64);
        // 32 bytes, URL-safe base64 without padding
        assert_eq!(issued.raw_token.len(), 43);
        assert!(!issued.raw_token.contains('='));
    }

    #[tokio::test]
    async fn tenant_named_after_email_domain() {
        let h = harness();
        let issued = h.auth.generate_login_token("dana@acme.com").await.unwrap();
        assert_eq!(h.principals.tenant_name(issued.principal.tenant_id).as_deref(), Some("Acme"));
        assert_eq!(issued.principal.role, Role::Admin);

        let second = h.auth.generate_login_token("lee@acme.com").await.unwrap();
        assert_eq!(second.principal.tenant_id, issued.principal.tenant_id);
        assert_eq!(second.principal.role, Role::Member);
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let h = harness();
        assert!(matches!(
            h.auth.generate_login_token("not-an-email").await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn magic_link_email() {
        let h = harness();
        let issued = h.auth.generate_login_token("dana@acme.com").await.unwrap();
        let mailer = RecordingMailer::default();
        h.auth.send_magic_link(&mailer, &issued).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "dana@acme.com");
        assert_eq!(sent[0].1, "Your Mira login link");
        assert!(sent[0]
            .2
            .contains(&format!("http://localhost:8501?login_token={}", issued.raw_token)));
        assert!(sent[0].2.contains("expires in 15 minutes"));
    }

    #[tokio::test]
    async fn only_admins_of_the_same_tenant_change_roles() {
        let h = harness();
        let admin = h.auth.generate_login_token("admin@acme.com").await.unwrap().principal;
        let member = h.auth.generate_login_token("member@acme.com").await.unwrap().principal;
        let outsider = h.auth.generate_login_token("boss@other.io").await.unwrap().principal;

        assert!(matches!(
            h.auth.set_role(&member, admin.id, Role::Member).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            h.auth.set_role(&outsider, member.id, Role::Admin).await,
            Err(AppError::Forbidden(_))
        ));

        let promoted = h.auth.set_role(&admin, member.id, Role::Admin).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);
        let entries = h.audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "set_role");
    }
}
