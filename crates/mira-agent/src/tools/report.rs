use chrono::Local;
use serde_json::Value;
use std::sync::Arc;

use mira_core::models::ArtifactKind;
use mira_services::providers::ToolDefinition;

use super::board::{board_input_schema, BoardInput};
use super::{
    parse_input, Tool, ToolFuture, ToolOutput, TurnContext, LLM_NOT_CONFIGURED,
    TRELLO_NOT_CONFIGURED,
};
use crate::context::AgentContext;
use crate::generate::generate_status_report;

/// `generate_status_report(board_id_or_url)`
pub struct GenerateReportTool {
    context: Arc<AgentContext>,
}

impl GenerateReportTool {
    pub fn new(context: Arc<AgentContext>) -> Self {
        Self { context }
    }
}

impl Tool for GenerateReportTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "generate_status_report".to_string(),
            description: "Generate a weekly status report from a Trello board. Use this tool \
                when the user asks for a status report or weekly update."
                .to_string(),
            input_schema: board_input_schema(),
        }
    }

    fn execute<'a>(&'a self, turn: &'a TurnContext<'a>, input: Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let input: BoardInput = match parse_input("generate_status_report", input) {
                Ok(input) => input,
                Err(output) => return Ok(output),
            };
            let Some(board) = self.context.board() else {
                return Ok(ToolOutput::success(TRELLO_NOT_CONFIGURED));
            };
            let Some(llm) = self.context.llm() else {
                return Ok(ToolOutput::success(LLM_NOT_CONFIGURED));
            };

            let data = match board.fetch_board(&input.board_id_or_url).await {
                Ok(data) => data,
                Err(e) => {
                    return Ok(ToolOutput::error(format!("Error fetching Trello data: {}", e)))
                }
            };
            let today = Local::now().date_naive();
            let report = match generate_status_report(
                &**llm,
                &data,
                today,
                self.context.temperature(),
            )
            .await
            {
                Ok(report) => report,
                Err(e) => {
                    return Ok(ToolOutput::error(format!(
                        "Error generating status report: {}",
                        e
                    )))
                }
            };

            turn.state.save(ArtifactKind::Report, &report).await;
            Ok(ToolOutput::saved(
                format!(
                    "✅ **Status Report Generated Successfully!**\n\n{}\n\n---\n📥 **Download Options Available:** The report has been saved as PDF, DOCX, Markdown and text.",
                    report
                ),
                ArtifactKind::Report,
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatSession;
    use mira_services::test_helpers::{card, text_response, FakeBoard, ScriptedLlm};
    use serde_json::json;

    fn context(llm: Arc<ScriptedLlm>) -> Arc<AgentContext> {
        let board = Arc::new(FakeBoard::new(
            "b1",
            vec![
                ("To Do", vec![card("Task A", "", None)]),
                ("Done", vec![card("Task B", "", Some("2025-01-01T00:00:00.000Z"))]),
            ],
        ));
        Arc::new(AgentContext::new(0.7, 10).with_llm(llm).with_board(board))
    }

    #[tokio::test]
    async fn report_saved_with_todays_date() {
        let llm = Arc::new(ScriptedLlm::new(vec![text_response(
            "## Progress This Week\n### Completed Tasks\n- Task B\n### In Progress Tasks\n- Task A",
        )]));
        let session = ChatSession::default();
        let turn = TurnContext {
            vector_index: None,
            state: &session.artifacts,
        };

        let output = GenerateReportTool::new(context(llm.clone()))
            .execute(&turn, json!({"board_id_or_url": "b1"}))
            .await
            .unwrap();

        let today = Local::now().format("%Y-%m-%d").to_string();
        assert_eq!(output.saved, Some(ArtifactKind::Report));
        let report = session.current_report().unwrap();
        assert!(report.contains(&today));
        assert!(report.contains("### Completed Tasks\n- Task B"));
        assert!(report.contains("### In Progress Tasks\n- Task A"));

        let prompt = llm.requests()[0].messages[0].text();
        assert!(prompt.contains("## To Do\n- Task A\n## Done\n- Task B (Due: 2025-01-01)"));
    }

    #[tokio::test]
    async fn missing_board_credentials() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let context = Arc::new(AgentContext::new(0.7, 10).with_llm(llm.clone()));
        let session = ChatSession::default();
        let turn = TurnContext {
            vector_index: None,
            state: &session.artifacts,
        };
        let output = GenerateReportTool::new(context)
            .execute(&turn, json!({"board_id_or_url": "b1"}))
            .await
            .unwrap();
        assert_eq!(output.content, TRELLO_NOT_CONFIGURED);
        assert!(llm.requests().is_empty());
        assert_eq!(session.current_report(), None);
    }
}
