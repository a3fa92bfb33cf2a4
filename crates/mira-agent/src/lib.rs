//! Mira agent
//!
//! The bounded tool-calling loop behind the chat surface, its four tools,
//! the prompts they use, and the per-session state they read and write.

pub mod context;
pub mod generate;
pub mod prompts;
pub mod runner;
pub mod session;
pub mod tools;

pub use context::AgentContext;
pub use generate::{
    generate_project_plan, generate_status_report, plan_source_text, with_instructions,
};
pub use runner::{Agent, TurnOutcome};
pub use session::{ChatSession, SessionArtifacts, SessionState};
pub use tools::{Tool, ToolOutput, TurnContext};

#[cfg(test)]
mod test_support;
