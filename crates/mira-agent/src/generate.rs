//! Plan and report generation, shared by the tools and the direct
//! (non-chat) path.

use chrono::NaiveDate;
use std::time::Instant;

use mira_core::AppError;
use mira_processing::clean_markdown;
use mira_services::providers::BoardData;
use mira_services::{LlmProvider, SearchHit};

use crate::prompts::{
    project_plan_prompt, status_report_prompt, PLAN_SYSTEM_PROMPT, REPORT_SYSTEM_PROMPT,
};

/// Group retrieved passages by source, in first-seen order, under
/// `--- Content from <source> ---` headers.
pub fn plan_source_text(hits: &[SearchHit], instructions: Option<&str>) -> String {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for hit in hits {
        match groups.iter_mut().find(|(source, _)| *source == hit.source) {
            Some((_, texts)) => texts.push(&hit.text),
            None => groups.push((&hit.source, vec![&hit.text])),
        }
    }

    let mut text = String::new();
    for (source, texts) in groups {
        text.push_str(&format!("\n\n--- Content from {} ---\n", source));
        text.push_str(&texts.join("\n"));
    }
    with_instructions(text, instructions)
}

/// Append `--- Additional Instructions ---` when `instructions` is not blank.
pub fn with_instructions(mut text: String, instructions: Option<&str>) -> String {
    if let Some(instructions) = instructions.map(str::trim).filter(|i| !i.is_empty()) {
        text.push_str(&format!("\n\n--- Additional Instructions ---\n{}", instructions));
    }
    text
}

/// Board lists as `## <list>` blocks of card summaries.
pub fn board_report_text(board: &BoardData) -> String {
    board
        .summaries()
        .into_iter()
        .map(|(list, cards)| format!("## {}\n{}", list, cards.join("\n")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generate a project plan from extracted document text.
pub async fn generate_project_plan(
    llm: &dyn LlmProvider,
    documents_text: &str,
    temperature: f32,
) -> Result<String, AppError> {
    let start = Instant::now();
    let raw = llm
        .complete(PLAN_SYSTEM_PROMPT, &project_plan_prompt(documents_text), temperature)
        .await?;
    let plan = clean_markdown(&raw);
    tracing::info!(
        model = %llm.model(),
        input_chars = documents_text.len(),
        output_chars = plan.len(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Project plan generated"
    );
    Ok(plan)
}

/// Generate a status report for `date` from live board data. The result
/// always carries the report date.
pub async fn generate_status_report(
    llm: &dyn LlmProvider,
    board: &BoardData,
    date: NaiveDate,
    temperature: f32,
) -> Result<String, AppError> {
    let start = Instant::now();
    let date = date.format("%Y-%m-%d").to_string();
    let raw = llm
        .complete(
            REPORT_SYSTEM_PROMPT,
            &status_report_prompt(&board_report_text(board), &date),
            temperature,
        )
        .await?;

    let mut report = clean_markdown(&raw);
    if !report.contains(&date) {
        report = format!("**Report Date:** {}\n\n{}", date, report);
    }
    tracing::info!(
        model = %llm.model(),
        board_id = %board.board_id,
        output_chars = report.len(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Status report generated"
    );
    Ok(report)
}
