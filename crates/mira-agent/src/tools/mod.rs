//! Tools exposed to the model.
//!
//! A tool never fails the turn: missing prerequisites and upstream errors
//! come back as [`ToolOutput`] text the model can explain to the user.

mod board;
mod plan;
mod report;
mod search;

pub use board::{FetchBoardTool, TRELLO_NOT_CONFIGURED};
pub use plan::{GeneratePlanTool, NO_DOCUMENTS};
pub use report::GenerateReportTool;
pub use search::{SearchDocumentsTool, NO_INDEX};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use mira_core::models::ArtifactKind;
use mira_core::AppError;
use mira_services::providers::ToolDefinition;
use mira_services::VectorIndex;

use crate::context::AgentContext;
use crate::session::SessionState;

pub const LLM_NOT_CONFIGURED: &str =
    "❌ **LLM not configured!** Please ensure an OpenAI API key is provided.";

/// Result of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
    /// Artifact this call saved to the session, if any.
    pub saved: Option<ArtifactKind>,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
            saved: None,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
            saved: None,
        }
    }

    pub fn saved(content: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            content: content.into(),
            is_error: false,
            saved: Some(kind),
        }
    }
}

/// Session data a tool may read or write during one turn.
pub struct TurnContext<'a> {
    pub vector_index: Option<&'a VectorIndex>,
    pub state: &'a dyn SessionState,
}

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<ToolOutput, AppError>> + Send + 'a>>;

/// A tool the model can call by name.
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    fn execute<'a>(&'a self, turn: &'a TurnContext<'a>, input: Value) -> ToolFuture<'a>;
}

/// The four tools of the chat agent.
pub fn default_tools(context: Arc<AgentContext>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(SearchDocumentsTool::new(context.clone())),
        Arc::new(FetchBoardTool::new(context.clone())),
        Arc::new(GeneratePlanTool::new(context.clone())),
        Arc::new(GenerateReportTool::new(context)),
    ]
}

/// Deserialize tool arguments; a malformed call becomes an error observation.
pub(crate) fn parse_input<T: DeserializeOwned>(tool: &str, input: Value) -> Result<T, ToolOutput> {
    serde_json::from_value(input)
        .map_err(|e| ToolOutput::error(format!("Invalid arguments for {}: {}", tool, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Args {
        query: String,
    }

    #[test]
    fn tool_names_are_unique() {
        let tools = default_tools(Arc::new(AgentContext::new(0.7, 10)));
        let mut names: Vec<String> = tools.iter().map(|t| t.definition().name).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "fetch_trello_board",
                "generate_project_plan",
                "generate_status_report",
                "search_project_documents",
            ]
        );
    }

    #[test]
    fn malformed_arguments_become_error_output() {
        let err = parse_input::<Args>("search_project_documents", json!({"q": 1})).unwrap_err();
        assert!(err.is_error);
        assert!(err.content.starts_with("Invalid arguments for search_project_documents"));

        let args: Args = parse_input("search", json!({"query": "owners"})).unwrap();
        assert_eq!(args.query, "owners");
    }
}
