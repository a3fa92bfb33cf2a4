use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use mira_services::providers::ToolDefinition;
use mira_services::retrieval::{format_search_results, INTERACTIVE_K};
use mira_services::SearchOutcome;

use super::{parse_input, Tool, ToolFuture, ToolOutput, TurnContext};
use crate::context::AgentContext;

pub const NO_INDEX: &str =
    "No documents have been uploaded yet. Please ask the user to upload project documents first.";

#[derive(Deserialize)]
struct SearchInput {
    query: String,
}

/// `search_project_documents(query)`
pub struct SearchDocumentsTool {
    context: Arc<AgentContext>,
}

impl SearchDocumentsTool {
    pub fn new(context: Arc<AgentContext>) -> Self {
        Self { context }
    }
}

impl Tool for SearchDocumentsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_project_documents".to_string(),
            description: "Search through uploaded project documents to find relevant information. \
                Use this tool FIRST when answering questions about project requirements, scope, \
                timeline, milestones, deadlines, team members, roles, technical details or \
                anything else about the user's project."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query to find relevant information"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    fn execute<'a>(&'a self, turn: &'a TurnContext<'a>, input: Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let input: SearchInput = match parse_input("search_project_documents", input) {
                Ok(input) => input,
                Err(output) => return Ok(output),
            };
            let Some(retrieval) = self.context.retrieval() else {
                return Ok(ToolOutput::success(NO_INDEX));
            };

            match retrieval
                .search(turn.vector_index, &input.query, INTERACTIVE_K)
                .await
            {
                Ok(SearchOutcome::IndexMissing) => Ok(ToolOutput::success(NO_INDEX)),
                Ok(SearchOutcome::Results(hits)) if hits.is_empty() => Ok(ToolOutput::success(
                    format!("No relevant information found for query: '{}'", input.query),
                )),
                Ok(SearchOutcome::Results(hits)) => {
                    Ok(ToolOutput::success(format_search_results(&hits)))
                }
                Err(e) => Ok(ToolOutput::error(format!("Error searching documents: {}", e))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatSession;
    use crate::test_support::keyword_index;
    use mira_services::test_helpers::KeywordEmbedder;
    use mira_services::RetrievalEngine;

    fn tool(embedder: Arc<KeywordEmbedder>) -> SearchDocumentsTool {
        SearchDocumentsTool::new(Arc::new(
            AgentContext::new(0.7, 10).with_retrieval(RetrievalEngine::new(embedder)),
        ))
    }

    #[tokio::test]
    async fn missing_index_is_reported_not_raised() {
        let session = ChatSession::default();
        let turn = TurnContext {
            vector_index: None,
            state: &session.artifacts,
        };
        let output = tool(Arc::new(KeywordEmbedder::default()))
            .execute(&turn, json!({"query": "milestones"}))
            .await
            .unwrap();
        assert_eq!(output.content, NO_INDEX);
        assert!(!output.is_error);
    }

    #[tokio::test]
    async fn results_cite_source_files() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let index = keyword_index(
            &embedder,
            &[("milestones.txt", "Milestone 1: Launch by March 1. Owner: Dana.")],
        );
        let session = ChatSession::default();
        let turn = TurnContext {
            vector_index: Some(&index),
            state: &session.artifacts,
        };

        let output = tool(embedder)
            .execute(&turn, json!({"query": "who owns milestone 1"}))
            .await
            .unwrap();
        assert!(output.content.contains("`milestones.txt`"));
        assert!(output.content.contains("Owner: Dana."));
        assert_eq!(output.saved, None);
    }
}
