use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use mira_services::providers::{BoardData, ToolDefinition};

use super::{parse_input, Tool, ToolFuture, ToolOutput, TurnContext};
use crate::context::AgentContext;

pub const TRELLO_NOT_CONFIGURED: &str = "⚠️ **Trello credentials not configured!** Please save your Trello API key and token (trello_api_key, trello_token).";

#[derive(Deserialize)]
pub(super) struct BoardInput {
    pub board_id_or_url: String,
}

pub(super) fn board_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "board_id_or_url": {
                "type": "string",
                "description": "Trello board ID or full URL (e.g. 'abc123' or 'https://trello.com/b/abc123/board-name')"
            }
        },
        "required": ["board_id_or_url"]
    })
}

/// Board lists as `### <list>` blocks, `- (No cards)` for empty lists.
pub fn format_board(board: &BoardData) -> String {
    let mut output = String::from("**Trello Board Data:**\n\n");
    for (list, cards) in board.summaries() {
        output.push_str(&format!("### {}\n", list));
        if cards.is_empty() {
            output.push_str("- (No cards)\n");
        } else {
            for card in cards {
                output.push_str(&card);
                output.push('\n');
            }
        }
        output.push('\n');
    }
    output
}

/// `fetch_trello_board(board_id_or_url)`
pub struct FetchBoardTool {
    context: Arc<AgentContext>,
}

impl FetchBoardTool {
    pub fn new(context: Arc<AgentContext>) -> Self {
        Self { context }
    }
}

impl Tool for FetchBoardTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "fetch_trello_board".to_string(),
            description: "Fetch live task data from a Trello board. Use this tool when you need \
                to check task status or project progress."
                .to_string(),
            input_schema: board_input_schema(),
        }
    }

    fn execute<'a>(&'a self, _turn: &'a TurnContext<'a>, input: Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let input: BoardInput = match parse_input("fetch_trello_board", input) {
                Ok(input) => input,
                Err(output) => return Ok(output),
            };
            let Some(board) = self.context.board() else {
                return Ok(ToolOutput::success(TRELLO_NOT_CONFIGURED));
            };

            match board.fetch_board(&input.board_id_or_url).await {
                Ok(data) => Ok(ToolOutput::success(format_board(&data))),
                Err(e) => Ok(ToolOutput::error(format!("Error fetching Trello data: {}", e))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatSession;
    use mira_services::test_helpers::{card, FakeBoard};

    fn fake_board() -> Arc<FakeBoard> {
        Arc::new(FakeBoard::new(
            "b1",
            vec![
                ("To Do", vec![card("Task A", "", None)]),
                ("Done", vec![card("Task B", "", Some("2025-01-01T09:00:00.000Z"))]),
                ("Blocked", vec![]),
            ],
        ))
    }

    async fn run(tool: &FetchBoardTool, board_ref: &str) -> ToolOutput {
        let session = ChatSession::default();
        let turn = TurnContext {
            vector_index: None,
            state: &session.artifacts,
        };
        tool.execute(&turn, json!({ "board_id_or_url": board_ref }))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn lists_cards_per_list() {
        let tool = FetchBoardTool::new(Arc::new(AgentContext::new(0.7, 10).with_board(fake_board())));
        let output = run(&tool, "https://trello.com/b/b1/project").await;
        assert_eq!(
            output.content,
            "**Trello Board Data:**\n\n### To Do\n- Task A\n\n### Done\n- Task B (Due: 2025-01-01)\n\n### Blocked\n- (No cards)\n\n"
        );
    }

    #[tokio::test]
    async fn missing_credentials_message() {
        let tool = FetchBoardTool::new(Arc::new(AgentContext::new(0.7, 10)));
        let output = run(&tool, "b1").await;
        assert_eq!(output.content, TRELLO_NOT_CONFIGURED);
    }

    #[tokio::test]
    async fn board_errors_are_observations() {
        let tool = FetchBoardTool::new(Arc::new(AgentContext::new(0.7, 10).with_board(fake_board())));
        let output = run(&tool, "unknown").await;
        assert!(output.is_error);
        assert!(output
            .content
            .starts_with("Error fetching Trello data: Invalid Board ID or credentials"));
    }
}
