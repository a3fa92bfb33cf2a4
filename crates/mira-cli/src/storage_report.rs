//! Read-only inventory of Mira's storage locations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::format_bytes;

const LISTED_FILES: usize = 5;

pub const UPLOAD_LAYOUT: &str = "{company_id}/{user_id}/{sha256}/{filename}";

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Summary of one directory tree.
#[derive(Debug, Clone, Serialize)]
pub struct DirSummary {
    pub location: PathBuf,
    pub exists: bool,
    pub file_count: usize,
    pub total_size_bytes: u64,
    /// Up to five entries; newest first for outputs, path order for uploads.
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSection {
    pub size_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerSample {
    pub filename: String,
    pub size_bytes: i64,
    pub path: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerSection {
    pub total_records: Option<i64>,
    pub samples: Vec<LedgerSample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageReport {
    pub database: DatabaseSection,
    pub outputs: DirSummary,
    pub uploads: DirSummary,
    pub upload_layout: &'static str,
    pub documents: LedgerSection,
}

/// Generated plans and reports: flat directory, most recent first.
pub fn summarize_outputs(dir: &Path) -> io::Result<DirSummary> {
    let mut summary = empty_summary(dir);
    if !dir.is_dir() {
        return Ok(summary);
    }
    summary.exists = true;

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_file() {
            entries.push(file_entry(entry.file_name().into(), &meta));
        }
    }
    summary.file_count = entries.len();
    summary.total_size_bytes = entries.iter().map(|e| e.size_bytes).sum();
    entries.sort_by(|a, b| b.modified.cmp(&a.modified));
    entries.truncate(LISTED_FILES);
    summary.files = entries;
    Ok(summary)
}

/// Uploaded blobs: walks the whole tree, samples in path order, paths
/// relative to `dir`.
pub fn summarize_uploads(dir: &Path) -> io::Result<DirSummary> {
    let mut summary = empty_summary(dir);
    if !dir.is_dir() {
        return Ok(summary);
    }
    summary.exists = true;

    let mut entries = Vec::new();
    walk(dir, dir, &mut entries)?;
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    summary.file_count = entries.len();
    summary.total_size_bytes = entries.iter().map(|e| e.size_bytes).sum();
    entries.truncate(LISTED_FILES);
    summary.files = entries;
    Ok(summary)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<FileEntry>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        let path = entry.path();
        if meta.is_dir() {
            walk(root, &path, out)?;
        } else if meta.is_file() {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            out.push(file_entry(relative, &meta));
        }
    }
    Ok(())
}

fn empty_summary(dir: &Path) -> DirSummary {
    DirSummary {
        location: dir.to_path_buf(),
        exists: false,
        file_count: 0,
        total_size_bytes: 0,
        files: Vec::new(),
    }
}

fn file_entry(path: PathBuf, meta: &fs::Metadata) -> FileEntry {
    FileEntry {
        path,
        size_bytes: meta.len(),
        modified: meta.modified().ok().map(DateTime::<Utc>::from),
    }
}

/// Human-readable rendering of a report.
pub fn render_table(report: &StorageReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);
    out.push_str(&format!("{}\nMira - File Storage Locations\n{}\n\n", rule, rule));

    out.push_str("📊 Database:\n");
    match (&report.database.size_bytes, &report.database.error) {
        (Some(size), _) => out.push_str(&format!("  Size: {}\n", format_bytes(*size as u64))),
        (None, Some(e)) => out.push_str(&format!("  Could not check: {}\n", e)),
        (None, None) => out.push_str("  Not configured\n"),
    }
    out.push('\n');

    out.push_str("📤 Generated Outputs (Plans, Reports):\n");
    render_dir(&mut out, &report.outputs, "Recent files", "not created yet");
    out.push('\n');

    out.push_str("📥 Uploaded Files:\n");
    render_dir(&mut out, &report.uploads, "Sample files", "created on first upload");
    out.push_str(&format!("  Structure: uploads/{}\n\n", report.upload_layout));

    match (&report.documents.total_records, &report.documents.error) {
        (Some(0), _) => out.push_str("📋 Documents in Database: No documents stored yet\n"),
        (Some(total), _) => {
            out.push_str("📋 Documents in Database:\n");
            out.push_str(&format!("  Total records: {}\n  Sample records:\n", total));
            for doc in &report.documents.samples {
                out.push_str(&format!(
                    "    - {} ({})\n      Path: {}\n      Uploaded: {}\n",
                    doc.filename,
                    format_bytes(doc.size_bytes.max(0) as u64),
                    doc.path,
                    doc.uploaded_at
                ));
            }
        }
        (None, error) => out.push_str(&format!(
            "📋 Documents in Database: Could not check ({})\n",
            error.as_deref().unwrap_or("database not configured")
        )),
    }
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    out
}

fn render_dir(out: &mut String, summary: &DirSummary, list_label: &str, missing: &str) {
    if !summary.exists {
        out.push_str(&format!(
            "  Location: {} ({})\n",
            summary.location.display(),
            missing
        ));
        return;
    }
    out.push_str(&format!("  Location: {}\n", summary.location.display()));
    out.push_str(&format!("  Files: {} files\n", summary.file_count));
    out.push_str(&format!(
        "  Total Size: {}\n",
        format_bytes(summary.total_size_bytes)
    ));
    if !summary.files.is_empty() {
        out.push_str(&format!("  {}:\n", list_label));
        for file in &summary.files {
            out.push_str(&format!(
                "    - {} ({})\n",
                file.path.display(),
                format_bytes(file.size_bytes)
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn write(path: &Path, bytes: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn missing_directories_are_reported_not_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("outputs");
        let summary = summarize_outputs(&missing).unwrap();
        assert!(!summary.exists);
        assert_eq!(summary.file_count, 0);
        assert!(!summarize_uploads(&missing).unwrap().exists);
    }

    #[test]
    fn outputs_are_counted_and_listed_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..7 {
            let path = dir.path().join(format!("project_plan_{}.md", i));
            write(&path, &vec![b'x'; 10]);
            let file = fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000 + i))
                .unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();

        let summary = summarize_outputs(dir.path()).unwrap();
        assert_eq!(summary.file_count, 7);
        assert_eq!(summary.total_size_bytes, 70);
        assert_eq!(summary.files.len(), 5);
        assert_eq!(summary.files[0].path, PathBuf::from("project_plan_6.md"));
    }

    #[test]
    fn uploads_walk_the_content_addressed_tree() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("t1/u1/abc/prd.pdf"), b"pdf bytes");
        write(&dir.path().join("t1/u2/def/notes.txt"), b"notes");

        let summary = summarize_uploads(dir.path()).unwrap();
        assert_eq!(summary.file_count, 2);
        assert_eq!(summary.total_size_bytes, 14);
        assert_eq!(summary.files[0].path, PathBuf::from("t1/u1/abc/prd.pdf"));
    }

    #[test]
    fn table_reports_database_failure_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        let report = StorageReport {
            database: DatabaseSection {
                size_bytes: None,
                error: Some("DATABASE_URL is not set".to_string()),
            },
            outputs: summarize_outputs(&dir.path().join("outputs")).unwrap(),
            uploads: summarize_uploads(&dir.path().join("uploads")).unwrap(),
            upload_layout: UPLOAD_LAYOUT,
            documents: LedgerSection {
                total_records: None,
                samples: Vec::new(),
                error: Some("DATABASE_URL is not set".to_string()),
            },
        };

        let table = render_table(&report);
        assert!(table.contains("Could not check: DATABASE_URL is not set"));
        assert!(table.contains("(not created yet)"));
        assert!(table.contains("Structure: uploads/{company_id}/{user_id}/{sha256}/{filename}"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["database"]["size_bytes"], serde_json::Value::Null);
        assert_eq!(json["uploads"]["exists"], false);
    }
}
