//! The bounded tool-calling loop for one chat turn.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use mira_core::models::ArtifactKind;
use mira_core::{AppError, ErrorMetadata};
use mira_services::providers::{
    ChatRequest, ContentBlock, Message, ProviderError, Role, ToolCall, ToolDefinition,
};

use crate::context::AgentContext;
use crate::prompts::AGENT_SYSTEM_PROMPT;
use crate::session::ChatSession;
use crate::tools::{default_tools, Tool, ToolOutput, TurnContext};

/// What happened during one turn.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub tool_calls: usize,
    /// A plan was saved to the session during this turn.
    pub plan_generated: bool,
    /// A report was saved to the session during this turn.
    pub report_generated: bool,
    /// The tool-call limit was reached before the model answered.
    pub hit_tool_limit: bool,
    /// The model failed after tools had already run; `reply` explains it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_error: Option<String>,
}

/// Chat agent over an [`AgentContext`] and a set of tools.
pub struct Agent {
    context: Arc<AgentContext>,
    tools: HashMap<String, Arc<dyn Tool>>,
    tool_defs: Vec<ToolDefinition>,
}

impl Agent {
    /// Agent with the four standard tools.
    pub fn new(context: AgentContext) -> Self {
        let context = Arc::new(context);
        let tools = default_tools(context.clone());
        Self::with_tools(context, tools)
    }

    pub fn with_tools(context: Arc<AgentContext>, tools: Vec<Arc<dyn Tool>>) -> Self {
        let tool_defs = tools.iter().map(|t| t.definition()).collect();
        let tools = tools
            .into_iter()
            .map(|t| (t.definition().name, t))
            .collect();
        Self {
            context,
            tools,
            tool_defs,
        }
    }

    pub fn context(&self) -> &AgentContext {
        &self.context
    }

    /// Run one turn: plan, call tools sequentially, answer.
    ///
    /// The model sees the whole session history. At most
    /// `max_tool_calls` tools run; after that the model is asked to answer
    /// without tools. Tool failures become observations. A missing or
    /// rejected model credential, or an unreachable model, fails the turn
    /// only while no tool has run; the session history is then left as it
    /// was. Once a tool has run, its side effects stand, so a model failure
    /// ends the turn with an explanatory reply and the flags intact.
    pub async fn run_turn(
        &self,
        session: &mut ChatSession,
        user_message: &str,
    ) -> Result<TurnOutcome, AppError> {
        let llm = self.context.llm().ok_or_else(|| {
            AppError::not_configured("OpenAI", "Please provide an OpenAI API key (openai_api_key).")
        })?;

        let start = Instant::now();
        let max_tool_calls = self.context.max_tool_calls();
        let turn = TurnContext {
            vector_index: session.vector_index.as_ref(),
            state: &session.artifacts,
        };

        let mut messages = session.chat_history.clone();
        messages.push(Message::user(user_message));
        let mut outcome = TurnOutcome::default();
        let mut last_observation: Option<String> = None;

        loop {
            let tools_allowed = outcome.tool_calls < max_tool_calls;
            let request = ChatRequest {
                system: AGENT_SYSTEM_PROMPT.to_string(),
                messages: messages.clone(),
                tools: if tools_allowed {
                    self.tool_defs.clone()
                } else {
                    Vec::new()
                },
                temperature: self.context.temperature(),
            };

            let response = match llm.chat(request).await {
                Ok(response) => response,
                Err(e) if outcome.tool_calls == 0 => return Err(planning_error(e)),
                Err(e) => {
                    let err = planning_error(e);
                    tracing::warn!(
                        session_id = %session.id,
                        tool_calls = outcome.tool_calls,
                        error = %err,
                        "Model failed after tool calls, ending turn"
                    );
                    outcome.reply = interrupted_reply(&err, last_observation.as_deref());
                    outcome.model_error = Some(err.client_message());
                    break;
                }
            };
            let calls = response.tool_calls();

            if calls.is_empty() || !tools_allowed {
                let text = response.text();
                outcome.hit_tool_limit = !tools_allowed;
                outcome.reply = if !tools_allowed && (!calls.is_empty() || text.trim().is_empty())
                {
                    limit_reply(max_tool_calls, &text, last_observation.as_deref())
                } else {
                    text
                };
                break;
            }

            messages.push(Message {
                role: Role::Assistant,
                content: response.content,
            });

            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                if outcome.tool_calls >= max_tool_calls {
                    results.push(ContentBlock::ToolResult {
                        tool_use_id: call.id,
                        content: format!(
                            "Tool call limit of {} reached for this turn. Answer with what you have.",
                            max_tool_calls
                        ),
                        is_error: true,
                    });
                    continue;
                }
                outcome.tool_calls += 1;

                let output = self.execute_tool(&turn, &call).await;
                match output.saved {
                    Some(ArtifactKind::Plan) => outcome.plan_generated = true,
                    Some(ArtifactKind::Report) => outcome.report_generated = true,
                    None => {}
                }
                last_observation = Some(output.content.clone());
                results.push(ContentBlock::ToolResult {
                    tool_use_id: call.id,
                    content: output.content,
                    is_error: output.is_error,
                });
            }
            messages.push(Message::tool_results(results));
        }

        session.chat_history.push(Message::user(user_message));
        session
            .chat_history
            .push(Message::assistant(outcome.reply.clone()));

        tracing::info!(
            session_id = %session.id,
            tool_calls = outcome.tool_calls,
            plan_generated = outcome.plan_generated,
            report_generated = outcome.report_generated,
            hit_tool_limit = outcome.hit_tool_limit,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Agent turn completed"
        );
        Ok(outcome)
    }

    async fn execute_tool(&self, turn: &TurnContext<'_>, call: &ToolCall) -> ToolOutput {
        let Some(tool) = self.tools.get(&call.name) else {
            tracing::warn!(tool = %call.name, "Model requested an unknown tool");
            return ToolOutput::error(format!("Tool not found: {}", call.name));
        };

        let start = Instant::now();
        let output = match tool.execute(turn, call.input.clone()).await {
            Ok(output) => output,
            Err(e) => ToolOutput::error(format!("Error executing {}: {}", call.name, e)),
        };
        tracing::debug!(
            tool = %call.name,
            is_error = output.is_error,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Tool executed"
        );
        output
    }
}

/// A rejected key is a configuration problem, not an outage.
fn planning_error(err: ProviderError) -> AppError {
    match err {
        ProviderError::Api {
            service,
            status: 401 | 403,
            ..
        } => AppError::not_configured(service, "the OpenAI API key was rejected"),
        other => other.into(),
    }
}

fn interrupted_reply(err: &AppError, last_observation: Option<&str>) -> String {
    let mut reply = format!(
        "I could not finish this turn: {}",
        err.client_message()
    );
    if let Some(action) = err.suggested_action() {
        reply.push_str(&format!(" {}", action));
    }
    if let Some(observation) = last_observation {
        reply.push_str("\n\nHere is the latest result:\n\n");
        reply.push_str(observation);
    }
    reply
}

fn limit_reply(max_tool_calls: usize, text: &str, last_observation: Option<&str>) -> String {
    let mut reply = format!(
        "I reached the limit of {} tool calls for this turn.",
        max_tool_calls
    );
    if !text.trim().is_empty() {
        reply.push_str("\n\n");
        reply.push_str(text.trim());
    } else if let Some(observation) = last_observation {
        reply.push_str(" Here is the latest result:\n\n");
        reply.push_str(observation);
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::keyword_index;
    use crate::tools::NO_INDEX;
    use mira_core::ErrorMetadata;
    use mira_services::test_helpers::{
        card, text_response, tool_call_response, FakeBoard, KeywordEmbedder, ScriptedLlm,
    };
    use mira_services::RetrievalEngine;
    use serde_json::json;

    fn agent(llm: Arc<ScriptedLlm>, max_tool_calls: usize) -> Agent {
        let board = Arc::new(FakeBoard::new(
            "b1",
            vec![
                ("To Do", vec![card("Task A", "", None)]),
                ("Done", vec![card("Task B", "", Some("2025-01-01"))]),
            ],
        ));
        Agent::new(
            AgentContext::new(0.7, max_tool_calls)
                .with_llm(llm)
                .with_retrieval(RetrievalEngine::new(Arc::new(KeywordEmbedder::default())))
                .with_board(board),
        )
    }

    #[tokio::test]
    async fn direct_answer_without_tools() {
        let llm = Arc::new(ScriptedLlm::new(vec![text_response("Hello! How can I help?")]));
        let agent = agent(llm.clone(), 10);
        let mut session = ChatSession::default();

        let outcome = agent.run_turn(&mut session, "hi").await.unwrap();

        assert_eq!(outcome.reply, "Hello! How can I help?");
        assert_eq!(outcome.tool_calls, 0);
        assert_eq!(session.chat_history.len(), 2);
        let request = &llm.requests()[0];
        assert_eq!(request.system, AGENT_SYSTEM_PROMPT);
        assert_eq!(request.tools.len(), 4);
    }

    #[tokio::test]
    async fn tool_observation_feeds_next_step() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_call_response("call_1", "search_project_documents", json!({"query": "owner"})),
            text_response("Please upload documents first."),
        ]));
        let agent = agent(llm.clone(), 10);
        let mut session = ChatSession::default();

        let outcome = agent.run_turn(&mut session, "who owns milestone 1?").await.unwrap();

        assert_eq!(outcome.tool_calls, 1);
        assert_eq!(outcome.reply, "Please upload documents first.");
        let second = &llm.requests()[1];
        let observation = second.messages.last().unwrap();
        assert_eq!(
            observation.content,
            vec![ContentBlock::ToolResult {
                tool_use_id: "call_1".to_string(),
                content: NO_INDEX.to_string(),
                is_error: false,
            }]
        );
    }

    #[tokio::test]
    async fn tool_calls_are_capped() {
        let llm = Arc::new(ScriptedLlm::repeating(tool_call_response(
            "loop",
            "fetch_trello_board",
            json!({"board_id_or_url": "b1"}),
        )));
        let agent = agent(llm.clone(), 3);
        let mut session = ChatSession::default();

        let outcome = agent.run_turn(&mut session, "status?").await.unwrap();

        assert_eq!(outcome.tool_calls, 3);
        assert!(outcome.hit_tool_limit);
        assert!(outcome.reply.starts_with("I reached the limit of 3 tool calls"));
        assert!(outcome.reply.contains("### To Do"));
        let requests = llm.requests();
        assert_eq!(requests.len(), 4);
        assert!(requests[3].tools.is_empty());
    }

    #[tokio::test]
    async fn extra_calls_in_one_response_are_refused() {
        let mut many = tool_call_response("a", "fetch_trello_board", json!({"board_id_or_url": "b1"}));
        many.content.extend(
            tool_call_response("b", "fetch_trello_board", json!({"board_id_or_url": "b1"})).content,
        );
        let llm = Arc::new(ScriptedLlm::new(vec![many, text_response("done")]));
        let agent = agent(llm.clone(), 1);
        let mut session = ChatSession::default();

        let outcome = agent.run_turn(&mut session, "status?").await.unwrap();
        assert_eq!(outcome.tool_calls, 1);
        assert!(outcome.hit_tool_limit);
        assert_eq!(outcome.reply, "done");

        let requests = llm.requests();
        let results = &requests[1].messages.last().unwrap().content;
        assert!(matches!(
            &results[1],
            ContentBlock::ToolResult { is_error: true, content, .. } if content.contains("limit of 1")
        ));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_observation() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_call_response("x", "delete_everything", json!({})),
            text_response("I can't do that."),
        ]));
        let agent = agent(llm.clone(), 10);
        let mut session = ChatSession::default();

        let outcome = agent.run_turn(&mut session, "delete").await.unwrap();
        assert_eq!(outcome.reply, "I can't do that.");
        let requests = llm.requests();
        let results = &requests[1].messages.last().unwrap().content;
        assert!(matches!(
            &results[0],
            ContentBlock::ToolResult { is_error: true, content, .. } if content == "Tool not found: delete_everything"
        ));
    }

    #[tokio::test]
    async fn report_generation_sets_flag() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_call_response("r", "generate_status_report", json!({"board_id_or_url": "b1"})),
            text_response("# Weekly Status\n- Task B done"),
            text_response("Your report is ready."),
        ]));
        let agent = agent(llm, 10);
        let mut session = ChatSession::default();

        let outcome = agent.run_turn(&mut session, "weekly report for b1").await.unwrap();

        assert!(outcome.report_generated);
        assert!(!outcome.plan_generated);
        assert!(session.current_report().unwrap().contains("# Weekly Status"));

        // flags describe the turn, not the session
        let outcome = agent.run_turn(&mut session, "thanks").await.unwrap();
        assert!(!outcome.report_generated);
        assert!(session.current_report().is_some());
    }

    #[tokio::test]
    async fn model_failure_after_report_keeps_flag() {
        let llm = Arc::new(ScriptedLlm::with_results(vec![
            Ok(tool_call_response("r", "generate_status_report", json!({"board_id_or_url": "b1"}))),
            Ok(text_response("# Weekly Status\n- Task B done")),
            Err(ProviderError::Timeout {
                service: "OpenAI",
                seconds: 60,
            }),
        ]));
        let agent = agent(llm, 10);
        let mut session = ChatSession::default();

        let outcome = agent.run_turn(&mut session, "weekly report for b1").await.unwrap();

        assert!(outcome.report_generated);
        assert_eq!(outcome.tool_calls, 1);
        assert!(outcome.model_error.is_some());
        assert!(outcome.reply.starts_with("I could not finish this turn"));
        assert!(outcome.reply.contains("# Weekly Status"));
        assert!(session.current_report().unwrap().contains("# Weekly Status"));
        assert_eq!(session.chat_history.len(), 2);
    }

    #[tokio::test]
    async fn model_failure_before_tools_fails_turn() {
        let llm = Arc::new(ScriptedLlm::with_results(vec![Err(ProviderError::Timeout {
            service: "OpenAI",
            seconds: 60,
        })]));
        let agent = agent(llm, 10);
        let mut session = ChatSession::default();

        let err = agent.run_turn(&mut session, "hi").await.unwrap_err();
        assert!(matches!(err, AppError::Timeout { .. }));
        assert!(session.chat_history.is_empty());
    }

    #[tokio::test]
    async fn history_accumulates_across_turns() {
        let llm = Arc::new(ScriptedLlm::new(vec![text_response("first"), text_response("second")]));
        let agent = agent(llm.clone(), 10);
        let mut session = ChatSession::default();

        agent.run_turn(&mut session, "one").await.unwrap();
        agent.run_turn(&mut session, "two").await.unwrap();

        let second = &llm.requests()[1];
        let texts: Vec<String> = second.messages.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["one", "first", "two"]);
        assert_eq!(session.chat_history.len(), 4);
    }

    #[tokio::test]
    async fn missing_llm_is_config_error() {
        let agent = Agent::new(AgentContext::new(0.7, 10));
        let mut session = ChatSession::default();
        let err = agent.run_turn(&mut session, "hi").await.unwrap_err();
        assert!(matches!(err, AppError::NotConfigured { .. }));
        assert!(session.chat_history.is_empty());
    }

    #[tokio::test]
    async fn rejected_key_fails_before_any_tool() {
        let llm = Arc::new(ScriptedLlm::unauthorized());
        let agent = agent(llm, 10);
        let mut session = ChatSession::default();

        let err = agent.run_turn(&mut session, "plan please").await.unwrap_err();
        assert!(matches!(err, AppError::NotConfigured { .. }));
        assert!(err.is_recoverable());
        assert!(session.chat_history.is_empty());
    }

    #[tokio::test]
    async fn search_with_index_answers_from_documents() {
        let embedder = KeywordEmbedder::default();
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_call_response("s", "search_project_documents", json!({"query": "who owns milestone 1"})),
            text_response("Dana owns Milestone 1 (milestones.txt)."),
        ]));
        let agent = agent(llm.clone(), 10);
        let mut session = ChatSession::default();
        session.vector_index = Some(keyword_index(
            &embedder,
            &[("milestones.txt", "Milestone 1: Launch by March 1. Owner: Dana.")],
        ));

        let outcome = agent.run_turn(&mut session, "who owns milestone 1?").await.unwrap();
        assert_eq!(outcome.tool_calls, 1);
        let observation = llm.requests()[1].messages.last().unwrap().clone();
        assert!(matches!(
            &observation.content[0],
            ContentBlock::ToolResult { content, .. } if content.contains("Dana") && content.contains("milestones.txt")
        ));
    }
}
