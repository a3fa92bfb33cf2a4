//! External collaborators: OpenAI chat and embeddings, the Trello board API.
//!
//! Every call returns a tagged result. Each client carries a request timeout
//! so a hung upstream surfaces as `Timeout` rather than blocking the turn.

pub mod embedding;
pub mod llm;
pub mod trello;

pub use embedding::{EmbeddingProvider, OpenAiEmbeddingClient};
pub use llm::{
    ChatRequest, ChatResponse, ContentBlock, LlmProvider, Message, OpenAiChatClient, Role,
    ToolCall, ToolDefinition,
};
pub use trello::{
    card_summary, parse_board_ref, BoardCard, BoardClient, BoardData, BoardError, BoardList,
    BoardSummary, CardUpdate, NewCard, TrelloClient,
};

use mira_core::AppError;
use std::time::Duration;
use thiserror::Error;

/// Errors from LLM and embedding calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{service} is not configured: {message}")]
    NotConfigured {
        service: &'static str,
        message: String,
    },

    #[error("{service} request timed out after {seconds}s")]
    Timeout { service: &'static str, seconds: u64 },

    #[error("{service} API error (HTTP {status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned an unexpected response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub(crate) fn from_reqwest(service: &'static str, seconds: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout { service, seconds }
        } else if err.is_decode() {
            ProviderError::Decode {
                service,
                message: err.to_string(),
            }
        } else {
            ProviderError::Transport {
                service,
                message: err.to_string(),
            }
        }
    }

    /// Error body of a non-success response. Auth failures are reduced to the
    /// status so upstream echoes of a key never reach logs.
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let message = if status == 401 || status == 403 {
            format!("authentication failed (HTTP {})", status)
        } else {
            response
                .text()
                .await
                .unwrap_or_else(|e| format!("<body read error: {}>", e))
        };
        ProviderError::Api {
            service,
            status,
            message,
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured { service, message } => {
                AppError::not_configured(service, message)
            }
            ProviderError::Timeout { service, seconds } => AppError::Timeout {
                service: service.to_string(),
                seconds,
            },
            other => AppError::external(provider_service(&other), other.to_string()),
        }
    }
}

fn provider_service(err: &ProviderError) -> &'static str {
    match err {
        ProviderError::NotConfigured { service, .. }
        | ProviderError::Timeout { service, .. }
        | ProviderError::Api { service, .. }
        | ProviderError::Transport { service, .. }
        | ProviderError::Decode { service, .. } => service,
    }
}

pub(crate) fn http_client(service: &'static str, timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::Transport {
            service,
            message: format!("Failed to create HTTP client: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mira_core::ErrorMetadata;

    #[test]
    fn timeout_maps_to_app_timeout() {
        let err: AppError = ProviderError::Timeout {
            service: "OpenAI",
            seconds: 60,
        }
        .into();
        assert_eq!(err.error_code(), "TIMEOUT");
        assert_eq!(err.to_string(), "OpenAI request timed out after 60s");
    }

    #[test]
    fn api_error_is_external_and_recoverable() {
        let err: AppError = ProviderError::Api {
            service: "OpenAI",
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(err.error_code(), "EXTERNAL_SERVICE_ERROR");
        assert!(err.is_recoverable());
    }
}
