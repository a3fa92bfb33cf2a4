//! Format-specific text extraction
//!
//! The extractor is chosen once from the file extension. Every variant
//! exposes the same `extract(bytes)` contract returning normalized text plus
//! metadata, or an [`ExtractError`] describing why the file could not be
//! read. Errors are per file; callers record them and move on.

mod docx;
mod normalize;
mod pdf;
mod spreadsheet;
mod text;

pub use normalize::normalize_text;

use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Per-file extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file format: {0}")]
    Unsupported(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("spreadsheet extraction failed: {0}")]
    Spreadsheet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extractor variant, resolved from the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
    Spreadsheet,
}

/// What extraction learned about a file besides its text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractMetadata {
    pub page_count: Option<usize>,
    pub sheet_count: Option<usize>,
    pub paragraph_count: Option<usize>,
    pub table_count: Option<usize>,
    /// Detected encoding label for plain text.
    pub encoding: Option<String>,
    /// Whether the encoding detector was confident in its guess.
    pub encoding_confident: Option<bool>,
    /// Set when the detected encoding failed and bytes were decoded as
    /// UTF-8 with replacement characters.
    pub lossy_fallback: bool,
}

/// Extracted text and metadata of one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extracted {
    pub text: String,
    pub metadata: ExtractMetadata,
}

impl DocumentKind {
    /// Resolve the extractor from a filename; `None` for unsupported
    /// extensions.
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)?;

        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            "txt" | "md" | "csv" => Some(DocumentKind::PlainText),
            "xlsx" | "xls" | "xlsm" | "ods" => Some(DocumentKind::Spreadsheet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::PlainText => "text",
            DocumentKind::Spreadsheet => "spreadsheet",
        }
    }

    /// Extract and normalize text. CPU-bound; run on a blocking thread.
    pub fn extract(&self, bytes: &[u8]) -> Result<Extracted, ExtractError> {
        let mut extracted = match self {
            DocumentKind::Pdf => pdf::extract(bytes)?,
            DocumentKind::Docx => docx::extract(bytes)?,
            DocumentKind::PlainText => text::extract(bytes),
            DocumentKind::Spreadsheet => spreadsheet::extract(bytes)?,
        };
        extracted.text = normalize_text(&extracted.text);
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_by_extension() {
        assert_eq!(DocumentKind::from_filename("a.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_filename("requirements.docx"), Some(DocumentKind::Docx));
        assert_eq!(
            DocumentKind::from_filename("notes.md"),
            Some(DocumentKind::PlainText)
        );
        assert_eq!(
            DocumentKind::from_filename("budget.xlsm"),
            Some(DocumentKind::Spreadsheet)
        );
        assert_eq!(DocumentKind::from_filename("slides.pptx"), None);
        assert_eq!(DocumentKind::from_filename("README"), None);
    }

    #[test]
    fn plain_text_is_normalized() {
        let extracted = DocumentKind::PlainText
            .extract(b"line one\r\n\r\n\r\n\r\nline two")
            .unwrap();
        assert_eq!(extracted.text, "line one\n\nline two");
    }
}
