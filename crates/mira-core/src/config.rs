//! Configuration module
//!
//! Settings are read from the process environment (after loading `.env` via
//! dotenvy). Values that only some commands need (database URL, master key,
//! HMAC secret, SMTP sender) are kept optional here and checked at the point
//! of first use through the `require_*` accessors, which fail with the name of
//! the missing variable.

use std::env;
use std::path::PathBuf;

use crate::error::AppError;
use crate::storage_types::StorageBackend;

const DB_MAX_CONNECTIONS: u32 = 10;
const DB_TIMEOUT_SECS: u64 = 30;
const LOGIN_TOKEN_TTL_MINUTES: i64 = 15;
const HTTP_TIMEOUT_SECS: u64 = 60;
const AGENT_MAX_TOOL_CALLS: usize = 10;
const CHUNK_SIZE: usize = 1000;
const CHUNK_OVERLAP: usize = 200;
const LLM_TEMPERATURE: f32 = 0.7;
const SMTP_PORT: u16 = 587;

/// Chat models offered to users.
pub const SUPPORTED_MODELS: &[&str] = &["gpt-4o-mini", "gpt-3.5-turbo", "gpt-4o"];

/// OpenAI-compatible endpoint settings. The API key itself is a per-tenant or
/// per-user secret and is resolved at request time, not configured here.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f32,
}

/// S3-compatible object storage settings.
#[derive(Clone, Debug)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
}

/// SMTP settings for magic-link delivery.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub sender: Option<String>,
    pub password: Option<String>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub secrets_master_key: Option<String>,
    pub auth_secret: Option<String>,
    pub app_base_url: String,
    pub default_company_name: String,
    pub login_token_ttl_minutes: i64,
    pub openai: OpenAiConfig,
    pub http_timeout_secs: u64,
    pub agent_max_tool_calls: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub uploads_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub s3: Option<S3Config>,
    pub smtp: SmtpConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let openai = OpenAiConfig {
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| SUPPORTED_MODELS[0].to_string()),
            embedding_model: env::var("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            temperature: env::var("LLM_TEMPERATURE")
                .unwrap_or_else(|_| LLM_TEMPERATURE.to_string())
                .parse()
                .unwrap_or(LLM_TEMPERATURE),
        };

        let config = Config {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| DB_MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(DB_MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| DB_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DB_TIMEOUT_SECS),
            secrets_master_key: env::var("SECRETS_MASTER_KEY").ok().filter(|s| !s.is_empty()),
            auth_secret: env::var("AUTH_SECRET").ok().filter(|s| !s.is_empty()),
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8501".to_string()),
            default_company_name: env::var("DEFAULT_COMPANY_NAME")
                .unwrap_or_else(|_| "Default Company".to_string()),
            login_token_ttl_minutes: env::var("LOGIN_TOKEN_TTL_MINUTES")
                .unwrap_or_else(|_| LOGIN_TOKEN_TTL_MINUTES.to_string())
                .parse()
                .unwrap_or(LOGIN_TOKEN_TTL_MINUTES),
            openai,
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| HTTP_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(HTTP_TIMEOUT_SECS),
            agent_max_tool_calls: env::var("AGENT_MAX_TOOL_CALLS")
                .unwrap_or_else(|_| AGENT_MAX_TOOL_CALLS.to_string())
                .parse()
                .unwrap_or(AGENT_MAX_TOOL_CALLS),
            chunk_size: env::var("CHUNK_SIZE")
                .unwrap_or_else(|_| CHUNK_SIZE.to_string())
                .parse()
                .unwrap_or(CHUNK_SIZE),
            chunk_overlap: env::var("CHUNK_OVERLAP")
                .unwrap_or_else(|_| CHUNK_OVERLAP.to_string())
                .parse()
                .unwrap_or(CHUNK_OVERLAP),
            uploads_dir: PathBuf::from(
                env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string()),
            ),
            outputs_dir: PathBuf::from(
                env::var("OUTPUTS_DIR").unwrap_or_else(|_| "outputs".to_string()),
            ),
            s3: s3_from_env(),
            smtp: SmtpConfig {
                server: env::var("SMTP_SERVER").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|&p| p > 0)
                    .unwrap_or(SMTP_PORT),
                sender: env::var("EMAIL_SENDER").ok().filter(|s| !s.is_empty()),
                password: env::var("EMAIL_PASSWORD").ok().filter(|s| !s.is_empty()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(url) = &self.database_url {
            if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.chunk_size == 0 {
            return Err(anyhow::anyhow!("CHUNK_SIZE must be greater than zero"));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(anyhow::anyhow!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap,
                self.chunk_size
            ));
        }

        if self.agent_max_tool_calls == 0 {
            return Err(anyhow::anyhow!(
                "AGENT_MAX_TOOL_CALLS must be greater than zero"
            ));
        }

        if self.login_token_ttl_minutes <= 0 {
            return Err(anyhow::anyhow!(
                "LOGIN_TOKEN_TTL_MINUTES must be greater than zero"
            ));
        }

        Ok(())
    }

    pub fn require_database_url(&self) -> Result<&str, AppError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| AppError::Config("DATABASE_URL is not set".to_string()))
    }

    pub fn require_secrets_master_key(&self) -> Result<&str, AppError> {
        self.secrets_master_key
            .as_deref()
            .ok_or_else(|| AppError::Config("SECRETS_MASTER_KEY is not set".to_string()))
    }

    pub fn require_auth_secret(&self) -> Result<&str, AppError> {
        self.auth_secret
            .as_deref()
            .ok_or_else(|| AppError::Config("AUTH_SECRET is not set".to_string()))
    }

    /// Storage backend chosen by configuration presence: S3 only when every
    /// S3 variable is set.
    pub fn storage_backend(&self) -> StorageBackend {
        if self.s3.is_some() {
            StorageBackend::S3
        } else {
            StorageBackend::Local
        }
    }
}

fn s3_from_env() -> Option<S3Config> {
    let get = |name: &str| env::var(name).ok().filter(|s| !s.is_empty());
    Some(S3Config {
        endpoint: get("S3_ENDPOINT")?,
        region: get("S3_REGION")?,
        access_key: get("S3_ACCESS_KEY")?,
        secret_key: get("S3_SECRET_KEY")?,
        bucket: get("S3_BUCKET")?,
    })
}

#[cfg(any(test, feature = "test-helpers"))]
impl Config {
    /// Defaults without reading the environment; required values unset.
    pub fn for_tests() -> Config {
        Config {
            database_url: None,
            db_max_connections: DB_MAX_CONNECTIONS,
            db_timeout_seconds: DB_TIMEOUT_SECS,
            secrets_master_key: None,
            auth_secret: None,
            app_base_url: "http://localhost:8501".to_string(),
            default_company_name: "Default Company".to_string(),
            login_token_ttl_minutes: LOGIN_TOKEN_TTL_MINUTES,
            openai: OpenAiConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                embedding_model: "text-embedding-3-small".to_string(),
                temperature: LLM_TEMPERATURE,
            },
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            agent_max_tool_calls: AGENT_MAX_TOOL_CALLS,
            chunk_size: CHUNK_SIZE,
            chunk_overlap: CHUNK_OVERLAP,
            uploads_dir: PathBuf::from("uploads"),
            outputs_dir: PathBuf::from("outputs"),
            s3: None,
            smtp: SmtpConfig {
                server: "smtp.gmail.com".to_string(),
                port: SMTP_PORT,
                sender: None,
                password: None,
            },
        }
    }
}
