//! Text embeddings (OpenAI `/embeddings`).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use mira_core::OpenAiConfig;

use super::{http_client, ProviderError};

const SERVICE: &str = "OpenAI embeddings";

/// Maps texts to fixed-dimension vectors, one per input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

pub struct OpenAiEmbeddingClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for OpenAiEmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiEmbeddingClient {
    pub fn new(
        api_key: impl Into<String>,
        config: &OpenAiConfig,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured {
                service: SERVICE,
                message: "openai_api_key is not set".to_string(),
            });
        }
        Ok(Self {
            client: http_client(SERVICE, timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.embedding_model.clone(),
            timeout_secs,
        })
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({"model": self.model, "input": inputs}))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(SERVICE, self.timeout_secs, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(SERVICE, response).await);
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(SERVICE, self.timeout_secs, e))?;
        if parsed.data.len() != inputs.len() {
            return Err(ProviderError::Decode {
                service: SERVICE,
                message: format!(
                    "expected {} embeddings, received {}",
                    inputs.len(),
                    parsed.data.len()
                ),
            });
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config(base_url: &str) -> OpenAiConfig {
        OpenAiConfig {
            base_url: base_url.to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn embeddings_returned_in_input_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .match_body(Matcher::PartialJson(json!({
                "model": "text-embedding-3-small",
                "input": ["a", "b"]
            })))
            .with_status(200)
            .with_body(
                r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#,
            )
            .create_async()
            .await;

        let client = OpenAiEmbeddingClient::new("sk", &config(&server.url()), 5).unwrap();
        let vectors = client
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn count_mismatch_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_body(r#"{"data":[{"index":0,"embedding":[1.0]}]}"#)
            .create_async()
            .await;

        let client = OpenAiEmbeddingClient::new("sk", &config(&server.url()), 5).unwrap();
        let err = client
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }));
    }

    #[tokio::test]
    async fn server_error_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(500)
            .with_body("upstream down")
            .create_async()
            .await;

        let client = OpenAiEmbeddingClient::new("sk", &config(&server.url()), 5).unwrap();
        let err = client.embed(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn empty_input_makes_no_request() {
        let client = OpenAiEmbeddingClient::new("sk", &config("http://127.0.0.1:9"), 5).unwrap();
        assert!(client.embed(&[]).await.unwrap().is_empty());
    }
}
