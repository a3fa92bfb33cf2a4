//! Chat completions with function tools (OpenAI format).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use mira_core::OpenAiConfig;

use super::{http_client, ProviderError};

const SERVICE: &str = "OpenAI";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: results,
        }
    }

    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Vec<ContentBlock>,
}

impl ChatResponse {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Chat-completion provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn model(&self) -> &str;

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Single-shot completion without tools.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let response = self
            .chat(ChatRequest {
                system: system.to_string(),
                messages: vec![Message::user(user)],
                tools: Vec::new(),
                temperature,
            })
            .await?;
        Ok(response.text())
    }
}

/// OpenAI `/chat/completions` client.
pub struct OpenAiChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for OpenAiChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiChatClient {
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
            model: config.model.clone(),
            timeout_secs,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl LlmProvider for OpenAiChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = std::time::Instant::now();
        let body = build_request(&self.model, &request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(SERVICE, self.timeout_secs, e))?;

        if !response.status().is_success() {
            let err = ProviderError::from_response(SERVICE, response).await;
            tracing::warn!(error = %err, model = %self.model, "Chat completion failed");
            return Err(err);
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(SERVICE, self.timeout_secs, e))?;
        let result = into_chat_response(parsed)?;

        tracing::debug!(
            model = %self.model,
            tool_calls = result.tool_calls().len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Chat completion received"
        );
        Ok(result)
    }
}

fn build_request(model: &str, request: &ChatRequest) -> Value {
    let mut messages = Vec::new();
    if !request.system.is_empty() {
        messages.push(json!({"role": "system", "content": request.system}));
    }

    for msg in &request.messages {
        match msg.role {
            Role::User => {
                let mut text_parts = Vec::new();
                for block in &msg.content {
                    match block {
                        ContentBlock::Text { text } => text_parts.push(text.as_str()),
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                        } => {
                            let content = if *is_error {
                                format!("[ERROR] {}", content)
                            } else {
                                content.clone()
                            };
                            messages.push(json!({
                                "role": "tool",
                                "tool_call_id": tool_use_id,
                                "content": content,
                            }));
                        }
                        ContentBlock::ToolUse { .. } => {}
                    }
                }
                if !text_parts.is_empty() {
                    messages.push(json!({"role": "user", "content": text_parts.join("\n\n")}));
                }
            }
            Role::Assistant => {
                let text = msg.text();
                let tool_calls: Vec<Value> = msg
                    .content
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::ToolUse { id, name, input } => Some(json!({
                            "id": id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": input.to_string(),
                            }
                        })),
                        _ => None,
                    })
                    .collect();

                let mut entry = json!({"role": "assistant"});
                entry["content"] = if text.is_empty() {
                    Value::Null
                } else {
                    Value::String(text)
                };
                if !tool_calls.is_empty() {
                    entry["tool_calls"] = Value::Array(tool_calls);
                }
                messages.push(entry);
            }
        }
    }

    let mut body = json!({
        "model": model,
        "messages": messages,
        "temperature": request.temperature,
    });
    if !request.tools.is_empty() {
        body["tools"] = Value::Array(
            request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                        }
                    })
                })
                .collect(),
        );
    }
    body
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunction,
}

#[derive(Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

fn into_chat_response(api: ApiResponse) -> Result<ChatResponse, ProviderError> {
    let choice = api
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Decode {
            service: SERVICE,
            message: "empty choices array in response".to_string(),
        })?;

    let mut content = Vec::new();
    if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
        content.push(ContentBlock::Text { text });
    }
    for call in choice.message.tool_calls.unwrap_or_default() {
        let input = if call.function.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
                tracing::warn!(tool = %call.function.name, error = %e, "Malformed tool arguments, using empty object");
                json!({})
            })
        };
        content.push(ContentBlock::ToolUse {
            id: call.id,
            name: call.function.name,
            input,
        });
    }
    Ok(ChatResponse { content })
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

    #[test]
    fn request_carries_system_tools_and_tool_results() {
        let request = ChatRequest {
            system: "You are Mira.".to_string(),
            messages: vec![
                Message::user("who owns milestone 1"),
                Message {
                    role: Role::Assistant,
                    content: vec![ContentBlock::ToolUse {
                        id: "call_1".to_string(),
                        name: "search_project_documents".to_string(),
                        input: json!({"query": "milestone 1 owner"}),
                    }],
                },
                Message::tool_results(vec![ContentBlock::ToolResult {
                    tool_use_id: "call_1".to_string(),
                    content: "Owner: Dana".to_string(),
                    is_error: false,
                }]),
            ],
            tools: vec![ToolDefinition {
                name: "search_project_documents".to_string(),
                description: "Search".to_string(),
                input_schema: json!({"type": "object"}),
            }],
            temperature: 0.7,
        };

        let body = build_request("gpt-4o-mini", &request);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "who owns milestone 1");
        assert_eq!(messages[2]["content"], Value::Null);
        assert_eq!(
            messages[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"query":"milestone 1 owner"}"#
        );
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "search_project_documents");
    }

    #[test]
    fn error_tool_results_are_prefixed() {
        let request = ChatRequest {
            system: String::new(),
            messages: vec![Message::tool_results(vec![ContentBlock::ToolResult {
                tool_use_id: "c".to_string(),
                content: "board unreachable".to_string(),
                is_error: true,
            }])],
            tools: vec![],
            temperature: 0.0,
        };
        let body = build_request("m", &request);
        assert_eq!(body["messages"][0]["content"], "[ERROR] board unreachable");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn empty_api_key_is_not_configured() {
        let err = OpenAiChatClient::new("  ", &config("http://localhost"), 5).unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn parses_text_and_tool_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({"model": "gpt-4o-mini", "temperature": 0.5})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{
                        "message": {
                            "content": null,
                            "tool_calls": [{
                                "id": "call_9",
                                "type": "function",
                                "function": {"name": "fetch_trello_board", "arguments": "{\"board_id_or_url\":\"abc\"}"}
                            }]
                        },
                        "finish_reason": "tool_calls"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = OpenAiChatClient::new("sk-test", &config(&server.url()), 5).unwrap();
        let response = client
            .chat(ChatRequest {
                system: "sys".to_string(),
                messages: vec![Message::user("status?")],
                tools: vec![],
                temperature: 0.5,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        let calls = response.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "fetch_trello_board");
        assert_eq!(calls[0].input["board_id_or_url"], "abc");
        assert_eq!(response.text(), "");
    }

    #[tokio::test]
    async fn auth_failure_is_sanitized() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key provided: sk-bad"}}"#)
            .create_async()
            .await;

        let client = OpenAiChatClient::new("sk-bad", &config(&server.url()), 5).unwrap();
        let err = client.complete("sys", "hi", 0.7).await.unwrap_err();
        match err {
            ProviderError::Api { status, message, .. } => {
                assert_eq!(status, 401);
                assert!(!message.contains("sk-bad"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn complete_returns_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r##"{"choices":[{"message":{"content":"# Plan"},"finish_reason":"stop"}]}"##)
            .create_async()
            .await;

        let client = OpenAiChatClient::new("sk", &config(&server.url()), 5).unwrap();
        assert_eq!(client.complete("sys", "go", 0.7).await.unwrap(), "# Plan");
    }
}
