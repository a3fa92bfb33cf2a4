use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of generated artifact. A new generation of a kind replaces the
/// previous one in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Plan,
    Report,
}

impl ArtifactKind {
    /// File name prefix for rendered outputs.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Plan => "project_plan",
            ArtifactKind::Report => "status_report",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ArtifactKind::Plan => "Project Plan",
            ArtifactKind::Report => "Status Report",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Plan => f.write_str("plan"),
            ArtifactKind::Report => f.write_str("report"),
        }
    }
}

/// Output formats rendered for every artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Markdown,
    Text,
    Pdf,
    Docx,
}

impl ArtifactFormat {
    pub const ALL: [ArtifactFormat; 4] = [
        ArtifactFormat::Markdown,
        ArtifactFormat::Text,
        ArtifactFormat::Pdf,
        ArtifactFormat::Docx,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Markdown => "md",
            ArtifactFormat::Text => "txt",
            ArtifactFormat::Pdf => "pdf",
            ArtifactFormat::Docx => "docx",
        }
    }
}
