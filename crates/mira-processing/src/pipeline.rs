//! Batch document processing
//!
//! Each file is extracted independently on the blocking pool; one failing
//! file never aborts the batch. Output order follows input order.

use futures::future::join_all;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::document::{DocumentKind, ExtractError, Extracted};
use crate::fingerprint::file_set_fingerprint;

/// An uploaded file held in memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Fingerprint of a set of uploaded files.
pub fn fingerprint_of(files: &[UploadedFile]) -> String {
    file_set_fingerprint(files.iter().map(|f| (f.name.as_str(), &f.bytes[..])))
}

/// Outcome of processing one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FileStatus {
    Processed,
    EmptyOrUnreadable,
    Skipped,
    Error(String),
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Processed => f.write_str("Processed"),
            FileStatus::EmptyOrUnreadable => f.write_str("Empty or Unreadable"),
            FileStatus::Skipped => f.write_str("Skipped: unsupported format"),
            FileStatus::Error(e) => write!(f, "Error: {}", e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileDetail {
    pub name: String,
    pub status: FileStatus,
}

/// Text of one successfully processed file, used for chunking.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedDocument {
    pub name: String,
    pub kind: DocumentKind,
    pub extracted: Extracted,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessedBatch {
    /// Identity of the input file set, see [`file_set_fingerprint`].
    pub fingerprint: String,
    /// All extracted text with `--- Content from <file> ---` separators.
    pub combined_text: String,
    pub file_details: Vec<FileDetail>,
    pub documents: Vec<ExtractedDocument>,
}

enum Outcome {
    Text(DocumentKind, Extracted),
    Empty,
    Unsupported,
    Failed(String),
}

fn process_one(file: &UploadedFile) -> Outcome {
    let Some(kind) = DocumentKind::from_filename(&file.name) else {
        return Outcome::Unsupported;
    };
    match kind.extract(&file.bytes) {
        Ok(extracted) if extracted.text.trim().is_empty() => Outcome::Empty,
        Ok(extracted) => Outcome::Text(kind, extracted),
        Err(ExtractError::Unsupported(_)) => Outcome::Unsupported,
        Err(e) => Outcome::Failed(e.to_string()),
    }
}

/// Extract every file concurrently on the blocking pool and assemble the
/// combined text plus per-file statuses.
pub async fn process_files(files: &[UploadedFile]) -> ProcessedBatch {
    let start = std::time::Instant::now();

    let tasks = files.iter().cloned().map(|file| {
        tokio::task::spawn_blocking(move || process_one(&file))
    });
    let results = join_all(tasks).await;

    let mut batch = ProcessedBatch {
        fingerprint: fingerprint_of(files),
        ..Default::default()
    };
    for (file, result) in files.iter().zip(results) {
        let outcome = result
            .unwrap_or_else(|e| Outcome::Failed(format!("extraction task failed: {}", e)));
        let status = match outcome {
            Outcome::Text(kind, extracted) => {
                batch.combined_text.push_str(&format!(
                    "\n\n--- Content from {} ---\n{}",
                    file.name, extracted.text
                ));
                batch.documents.push(ExtractedDocument {
                    name: file.name.clone(),
                    kind,
                    extracted,
                });
                FileStatus::Processed
            }
            Outcome::Empty => FileStatus::EmptyOrUnreadable,
            Outcome::Unsupported => {
                batch
                    .combined_text
                    .push_str(&format!("\n\n[Skipped unsupported file format: {}]", file.name));
                FileStatus::Skipped
            }
            Outcome::Failed(e) => {
                tracing::warn!(file = %file.name, error = %e, "Document extraction failed");
                batch
                    .combined_text
                    .push_str(&format!("\n\n--- Error reading {} ---\n{}", file.name, e));
                FileStatus::Error(e)
            }
        };
        batch.file_details.push(FileDetail {
            name: file.name.clone(),
            status,
        });
    }
    batch.combined_text = batch.combined_text.trim().to_string();

    tracing::info!(
        files = files.len(),
        processed = batch.documents.len(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Document batch processed"
    );

    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mixed_batch_records_each_outcome() {
        let files = vec![
            UploadedFile::new("notes.txt", b"Milestone 1: Launch by March 1. Owner: Dana.".to_vec()),
            UploadedFile::new("blank.txt", b"   \n\n".to_vec()),
            UploadedFile::new("deck.pptx", b"PK..".to_vec()),
            UploadedFile::new("broken.pdf", b"not a pdf".to_vec()),
        ];

        let batch = process_files(&files).await;

        let statuses: Vec<String> = batch
            .file_details
            .iter()
            .map(|d| d.status.to_string())
            .collect();
        assert_eq!(statuses[0], "Processed");
        assert_eq!(statuses[1], "Empty or Unreadable");
        assert_eq!(statuses[2], "Skipped: unsupported format");
        assert!(statuses[3].starts_with("Error: PDF extraction failed"));

        assert!(batch
            .combined_text
            .starts_with("--- Content from notes.txt ---\nMilestone 1"));
        assert!(batch
            .combined_text
            .contains("[Skipped unsupported file format: deck.pptx]"));
        assert!(batch.combined_text.contains("--- Error reading broken.pdf ---"));
        assert_eq!(batch.documents.len(), 1);
        assert_eq!(batch.documents[0].name, "notes.txt");
    }

    #[tokio::test]
    async fn output_order_follows_input() {
        let files: Vec<UploadedFile> = (0..8)
            .map(|i| UploadedFile::new(format!("f{}.txt", i), format!("file {}", i).into_bytes()))
            .collect();
        let batch = process_files(&files).await;
        let names: Vec<&str> = batch.file_details.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["f0.txt", "f1.txt", "f2.txt", "f3.txt", "f4.txt", "f5.txt", "f6.txt", "f7.txt"]);
    }

    #[tokio::test]
    async fn fingerprint_tracks_file_set() {
        let files = vec![UploadedFile::new("plan.md", b"# Plan".to_vec())];
        let batch = process_files(&files).await;
        assert_eq!(batch.fingerprint, fingerprint_of(&files));

        let edited = vec![UploadedFile::new("plan.md", b"# Plam".to_vec())];
        assert_ne!(fingerprint_of(&files), fingerprint_of(&edited));
    }

    #[tokio::test]
    async fn empty_input() {
        let batch = process_files(&[]).await;
        assert!(batch.combined_text.is_empty());
        assert!(batch.file_details.is_empty());
    }
}
