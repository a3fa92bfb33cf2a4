//! Artifact rendering
//!
//! Generated plans and reports are written as sibling files in several
//! formats. Each format renders independently; a failure in one never blocks
//! the others.

mod clean;
mod docx;
mod markdown_text;
mod pdf;
mod writer;

pub use clean::clean_markdown;
pub use docx::{parse_blocks, render_docx, DocxBlock, Run};
pub use markdown_text::markdown_to_text;
pub use pdf::render_pdf;
pub use writer::{ArtifactOutputs, ArtifactWriter, RenderedFile};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DOCX archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("PDF rendering failed: {0}")]
    Pdf(String),
}
