use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use mira_core::models::ArtifactKind;
use mira_services::providers::ToolDefinition;
use mira_services::retrieval::{PLAN_SWEEP_K, PLAN_SWEEP_QUERY};
use mira_services::SearchOutcome;

use super::{parse_input, Tool, ToolFuture, ToolOutput, TurnContext, LLM_NOT_CONFIGURED};
use crate::context::AgentContext;
use crate::generate::{generate_project_plan, plan_source_text};

pub const NO_DOCUMENTS: &str = "❌ **No documents uploaded!** Please upload project documents (PRD, timeline, requirements) before generating a plan.";

#[derive(Deserialize, Default)]
struct PlanInput {
    #[serde(default)]
    additional_instructions: Option<String>,
}

/// `generate_project_plan(additional_instructions?)`
pub struct GeneratePlanTool {
    context: Arc<AgentContext>,
}

impl GeneratePlanTool {
    pub fn new(context: Arc<AgentContext>) -> Self {
        Self { context }
    }
}

impl Tool for GeneratePlanTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "generate_project_plan".to_string(),
            description: "Generate a comprehensive project execution plan from the uploaded \
                documents. Use this tool when the user asks for a project plan, execution plan \
                or roadmap."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "additional_instructions": {
                        "type": "string",
                        "description": "Optional additional instructions or focus areas"
                    }
                }
            }),
        }
    }

    fn execute<'a>(&'a self, turn: &'a TurnContext<'a>, input: Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let input: PlanInput = if input.is_null() {
                PlanInput::default()
            } else {
                match parse_input("generate_project_plan", input) {
                    Ok(input) => input,
                    Err(output) => return Ok(output),
                }
            };
            let Some(retrieval) = self.context.retrieval() else {
                return Ok(ToolOutput::success(NO_DOCUMENTS));
            };
            let Some(llm) = self.context.llm() else {
                return Ok(ToolOutput::success(LLM_NOT_CONFIGURED));
            };

            let hits = match retrieval
                .search(turn.vector_index, PLAN_SWEEP_QUERY, PLAN_SWEEP_K)
                .await
            {
                Ok(SearchOutcome::IndexMissing) => return Ok(ToolOutput::success(NO_DOCUMENTS)),
                Ok(SearchOutcome::Results(hits)) => hits,
                Err(e) => {
                    return Ok(ToolOutput::error(format!(
                        "Error generating project plan: {}",
                        e
                    )))
                }
            };
            if hits.is_empty() {
                return Ok(ToolOutput::success(
                    "No document content found. Please upload valid project documents.",
                ));
            }

            let source_text = plan_source_text(&hits, input.additional_instructions.as_deref());
            let plan = match generate_project_plan(
                &**llm,
                &source_text,
                self.context.temperature(),
            )
            .await
            {
                Ok(plan) => plan,
                Err(e) => {
                    return Ok(ToolOutput::error(format!(
                        "Error generating project plan: {}",
                        e
                    )))
                }
            };

            turn.state.save(ArtifactKind::Plan, &plan).await;
            Ok(ToolOutput::saved(
                format!(
                    "✅ **Project Plan Generated Successfully!**\n\n{}\n\n---\n📥 **Download Options Available:** The plan has been saved as PDF, DOCX, Markdown and text.",
                    plan
                ),
                ArtifactKind::Plan,
            ))
        })
    }
}
