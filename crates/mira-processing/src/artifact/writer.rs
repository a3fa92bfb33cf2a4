use chrono::{Local, NaiveDateTime};
use mira_core::models::{ArtifactFormat, ArtifactKind};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::{clean_markdown, markdown_to_text, render_docx, render_pdf, RenderError};

/// One file written for an artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedFile {
    pub format: ArtifactFormat,
    pub path: PathBuf,
    /// The format could not be rendered and a text file explaining why was
    /// written in its place.
    pub placeholder: bool,
}

/// Result of rendering one artifact to every format. Formats succeed or fail
/// independently.
#[derive(Debug)]
pub struct ArtifactOutputs {
    pub kind: ArtifactKind,
    /// Content after fence cleanup; this is what the markdown file holds.
    pub content: String,
    pub files: Vec<(ArtifactFormat, Result<RenderedFile, RenderError>)>,
}

impl ArtifactOutputs {
    pub fn file(&self, format: ArtifactFormat) -> Option<&RenderedFile> {
        self.files
            .iter()
            .find(|(f, _)| *f == format)
            .and_then(|(_, r)| r.as_ref().ok())
    }

    pub fn written(&self) -> impl Iterator<Item = &RenderedFile> {
        self.files.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (ArtifactFormat, &RenderError)> {
        self.files
            .iter()
            .filter_map(|(f, r)| r.as_ref().err().map(|e| (*f, e)))
    }
}

/// Writes rendered artifacts under an outputs directory as
/// `{prefix}_{YYYYMMDD_HHMMSS}.{ext}`.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    outputs_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            outputs_dir: outputs_dir.into(),
        }
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    /// Render `content` to every format. Blocking; call from a blocking task
    /// in async code.
    pub fn write(&self, kind: ArtifactKind, content: &str) -> Result<ArtifactOutputs, RenderError> {
        self.write_at(kind, content, Local::now().naive_local())
    }

    pub fn write_at(
        &self,
        kind: ArtifactKind,
        content: &str,
        at: NaiveDateTime,
    ) -> Result<ArtifactOutputs, RenderError> {
        let start = std::time::Instant::now();
        fs::create_dir_all(&self.outputs_dir)?;

        let content = clean_markdown(content);
        let stem = format!("{}_{}", kind.file_prefix(), at.format("%Y%m%d_%H%M%S"));

        let files = ArtifactFormat::ALL
            .iter()
            .map(|&format| (format, self.render_one(kind, format, &stem, &content)))
            .collect::<Vec<_>>();

        let outputs = ArtifactOutputs {
            kind,
            content,
            files,
        };
        for (format, error) in outputs.failures() {
            tracing::warn!(artifact = %kind, format = format.extension(), error = %error, "Artifact format failed to render");
        }
        tracing::info!(
            artifact = %kind,
            files = outputs.written().count(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Artifact rendered"
        );
        Ok(outputs)
    }

    fn render_one(
        &self,
        kind: ArtifactKind,
        format: ArtifactFormat,
        stem: &str,
        content: &str,
    ) -> Result<RenderedFile, RenderError> {
        let path = self
            .outputs_dir
            .join(format!("{}.{}", stem, format.extension()));
        let bytes = match format {
            ArtifactFormat::Markdown => content.as_bytes().to_vec(),
            ArtifactFormat::Text => markdown_to_text(content).into_bytes(),
            ArtifactFormat::Docx => render_docx(content)?,
            ArtifactFormat::Pdf => match render_pdf(kind.title(), content) {
                Ok(bytes) => bytes,
                Err(e) => return self.write_pdf_placeholder(stem, &e),
            },
        };
        fs::write(&path, bytes)?;
        Ok(RenderedFile {
            format,
            path,
            placeholder: false,
        })
    }

    fn write_pdf_placeholder(&self, stem: &str, error: &RenderError) -> Result<RenderedFile, RenderError> {
        tracing::warn!(error = %error, "PDF rendering unavailable, writing placeholder");
        let path = self.outputs_dir.join(format!("{}.pdf.txt", stem));
        fs::write(
            &path,
            format!(
                "PDF generation failed: {}\n\nThe markdown, text and DOCX versions of this document are available.\n",
                error
            ),
        )?;
        Ok(RenderedFile {
            format: ArtifactFormat::Pdf,
            path,
            placeholder: true,
        })
    }
}
