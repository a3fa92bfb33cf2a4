//! Per-session state: conversation memory, the session's vector index and
//! the latest generated plan and report.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use mira_core::models::ArtifactKind;
use mira_processing::{ArtifactWriter, RenderedFile};
use mira_services::providers::Message;
use mira_services::VectorIndex;

/// Where tools persist generated artifacts.
#[async_trait]
pub trait SessionState: Send + Sync {
    /// Replace the current artifact of `kind`.
    async fn save(&self, kind: ArtifactKind, content: &str);

    fn load(&self, kind: ArtifactKind) -> Option<String>;
}

#[derive(Default)]
struct Slots {
    current_plan: Option<String>,
    current_report: Option<String>,
    plan_files: Vec<RenderedFile>,
    report_files: Vec<RenderedFile>,
}

/// Latest plan and report of a session, rendered to files on save when a
/// writer is configured.
#[derive(Default)]
pub struct SessionArtifacts {
    writer: Option<ArtifactWriter>,
    slots: Mutex<Slots>,
}

impl SessionArtifacts {
    pub fn new(writer: Option<ArtifactWriter>) -> Self {
        Self {
            writer,
            slots: Mutex::new(Slots::default()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Files rendered for the current artifact of `kind`.
    pub fn files(&self, kind: ArtifactKind) -> Vec<RenderedFile> {
        let slots = self.slots();
        match kind {
            ArtifactKind::Plan => slots.plan_files.clone(),
            ArtifactKind::Report => slots.report_files.clone(),
        }
    }

    async fn render(&self, kind: ArtifactKind, content: &str) -> Vec<RenderedFile> {
        let Some(writer) = self.writer.clone() else {
            return Vec::new();
        };
        let content = content.to_string();
        match tokio::task::spawn_blocking(move || writer.write(kind, &content)).await {
            Ok(Ok(outputs)) => outputs.written().cloned().collect(),
            Ok(Err(e)) => {
                tracing::warn!(artifact = %kind, error = %e, "Artifact rendering failed");
                Vec::new()
            }
            Err(e) => {
                tracing::error!(artifact = %kind, error = %e, "Artifact rendering task failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl SessionState for SessionArtifacts {
    async fn save(&self, kind: ArtifactKind, content: &str) {
        let files = self.render(kind, content).await;
        let mut slots = self.slots();
        match kind {
            ArtifactKind::Plan => {
                slots.current_plan = Some(content.to_string());
                slots.plan_files = files;
            }
            ArtifactKind::Report => {
                slots.current_report = Some(content.to_string());
                slots.report_files = files;
            }
        }
    }

    fn load(&self, kind: ArtifactKind) -> Option<String> {
        let slots = self.slots();
        match kind {
            ArtifactKind::Plan => slots.current_plan.clone(),
            ArtifactKind::Report => slots.current_report.clone(),
        }
    }
}

/// One chat session. Owns its conversation memory and vector index; nothing
/// here is shared with other sessions.
pub struct ChatSession {
    pub id: Uuid,
    pub chat_history: Vec<Message>,
    pub vector_index: Option<VectorIndex>,
    pub artifacts: SessionArtifacts,
}

impl ChatSession {
    pub fn new(writer: Option<ArtifactWriter>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_history: Vec::new(),
            vector_index: None,
            artifacts: SessionArtifacts::new(writer),
        }
    }

    pub fn current_plan(&self) -> Option<String> {
        self.artifacts.load(ArtifactKind::Plan)
    }

    pub fn current_report(&self) -> Option<String> {
        self.artifacts.load(ArtifactKind::Report)
    }

    /// Forget the conversation. The index is kept.
    pub fn clear_history(&mut self) {
        self.chat_history.clear();
        tracing::debug!(session_id = %self.id, "Chat history cleared");
    }

    /// Forget the conversation and drop the vector index.
    pub fn reset(&mut self) {
        self.chat_history.clear();
        self.vector_index = None;
        tracing::debug!(session_id = %self.id, "Session reset");
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mira_core::models::ArtifactFormat;

    #[tokio::test]
    async fn save_replaces_previous_artifact() {
        let session = ChatSession::default();
        assert_eq!(session.current_plan(), None);

        session.artifacts.save(ArtifactKind::Plan, "# v1").await;
        session.artifacts.save(ArtifactKind::Plan, "# v2").await;
        assert_eq!(session.current_plan().as_deref(), Some("# v2"));
        assert_eq!(session.current_report(), None);
        assert!(session.artifacts.files(ArtifactKind::Plan).is_empty());
    }

    #[tokio::test]
    async fn save_renders_files_when_writer_configured() {
        let dir = tempfile::tempdir().unwrap();
        let session = ChatSession::new(Some(ArtifactWriter::new(dir.path())));

        session
            .artifacts
            .save(ArtifactKind::Report, "# Status\n- **Done:** kickoff")
            .await;

        let files = session.artifacts.files(ArtifactKind::Report);
        assert!(files.iter().any(|f| f.format == ArtifactFormat::Markdown));
        assert!(files.iter().any(|f| f.format == ArtifactFormat::Docx));
        for file in &files {
            assert!(file.path.starts_with(dir.path()));
            assert!(file
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("status_report_")));
        }
    }

    #[test]
    fn clear_keeps_index_and_reset_drops_it() {
        let mut session = ChatSession::default();
        session.chat_history.push(Message::user("hi"));
        session.vector_index = Some(VectorIndex::new("fp"));

        session.clear_history();
        assert!(session.chat_history.is_empty());
        assert!(session.vector_index.is_some());

        session.chat_history.push(Message::user("again"));
        session.reset();
        assert!(session.chat_history.is_empty());
        assert!(session.vector_index.is_none());
    }
}
