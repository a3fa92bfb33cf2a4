use std::sync::Arc;

use mira_core::Config;
use mira_processing::ChunkConfig;
use mira_services::{
    BoardClient, Indexer, LlmProvider, OpenAiChatClient, OpenAiEmbeddingClient,
    ResolvedCredentials, RetrievalEngine, TrelloClient,
};

/// Collaborators the tools and the loop run against.
///
/// Each collaborator is optional: a missing credential disables the
/// features that need it instead of failing the whole agent.
#[derive(Clone)]
pub struct AgentContext {
    llm: Option<Arc<dyn LlmProvider>>,
    retrieval: Option<RetrievalEngine>,
    board: Option<Arc<dyn BoardClient>>,
    temperature: f32,
    max_tool_calls: usize,
}

impl AgentContext {
    pub fn new(temperature: f32, max_tool_calls: usize) -> Self {
        Self {
            llm: None,
            retrieval: None,
            board: None,
            temperature,
            max_tool_calls,
        }
    }

    /// Build clients for whichever credentials resolved.
    pub fn from_credentials(config: &Config, credentials: &ResolvedCredentials) -> Self {
        let mut context = Self::new(config.openai.temperature, config.agent_max_tool_calls);

        if let Some(key) = credentials.openai_api_key() {
            match OpenAiChatClient::new(key, &config.openai, config.http_timeout_secs) {
                Ok(client) => context.llm = Some(Arc::new(client)),
                Err(e) => tracing::warn!(error = %e, "Chat client unavailable"),
            }
            match OpenAiEmbeddingClient::new(key, &config.openai, config.http_timeout_secs) {
                Ok(client) => context.retrieval = Some(RetrievalEngine::new(Arc::new(client))),
                Err(e) => tracing::warn!(error = %e, "Embedding client unavailable"),
            }
        }

        if let Some((key, token)) = credentials.trello() {
            match TrelloClient::new(key, token, config.http_timeout_secs) {
                Ok(client) => context.board = Some(Arc::new(client)),
                Err(e) => tracing::warn!(error = %e, "Board client unavailable"),
            }
        }

        tracing::debug!(
            llm = context.llm.is_some(),
            retrieval = context.retrieval.is_some(),
            board = context.board.is_some(),
            "Agent context ready"
        );
        context
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalEngine) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    pub fn with_board(mut self, board: Arc<dyn BoardClient>) -> Self {
        self.board = Some(board);
        self
    }

    pub fn llm(&self) -> Option<&Arc<dyn LlmProvider>> {
        self.llm.as_ref()
    }

    pub fn retrieval(&self) -> Option<&RetrievalEngine> {
        self.retrieval.as_ref()
    }

    pub fn board(&self) -> Option<&Arc<dyn BoardClient>> {
        self.board.as_ref()
    }

    /// Indexer sharing the retrieval engine's embedding client.
    pub fn indexer(&self, chunking: ChunkConfig) -> Option<Indexer> {
        self.retrieval
            .as_ref()
            .map(|retrieval| Indexer::new(retrieval.embedder(), chunking))
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tool_calls(&self) -> usize {
        self.max_tool_calls
    }
}
