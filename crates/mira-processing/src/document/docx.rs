use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use super::{ExtractError, ExtractMetadata, Extracted};

/// Extract the main document part of a DOCX. Heading paragraphs become
/// markdown headings by style name, tables become pipe-delimited rows.
pub(super) fn extract(bytes: &[u8]) -> Result<Extracted, ExtractError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Docx(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(e.to_string()))?
        .read_to_string(&mut xml)?;

    let body = parse_document_xml(&xml)?;
    Ok(Extracted {
        text: body.blocks.join("\n\n"),
        metadata: ExtractMetadata {
            paragraph_count: Some(body.paragraphs),
            table_count: Some(body.tables),
            ..Default::default()
        },
    })
}

#[derive(Default)]
struct Body {
    blocks: Vec<String>,
    paragraphs: usize,
    tables: usize,
}

#[derive(Default)]
struct TableState {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: Vec<String>,
}

fn attr_value(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Markdown heading level for a paragraph style id (`Heading2`, `Title`).
fn heading_level(style: &str) -> Option<usize> {
    let lower = style.to_ascii_lowercase();
    if lower == "title" {
        return Some(1);
    }
    let digits = lower.strip_prefix("heading")?.trim();
    digits.parse::<usize>().ok().map(|level| level.clamp(1, 6))
}

fn parse_document_xml(xml: &str) -> Result<Body, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut body = Body::default();

    let mut table_depth = 0usize;
    let mut table = TableState::default();
    let mut paragraph = String::new();
    let mut style: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        table = TableState::default();
                    }
                }
                b"w:p" => {
                    paragraph.clear();
                    style = None;
                }
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:pStyle" => style = attr_value(&e, b"w:val"),
                b"w:tab" => paragraph.push('\t'),
                b"w:br" | b"w:cr" => paragraph.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                paragraph.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    let text = paragraph.trim().to_string();
                    if table_depth > 0 {
                        if !text.is_empty() {
                            table.cell.push(text);
                        }
                    } else if !text.is_empty() {
                        body.paragraphs += 1;
                        match style.as_deref().and_then(heading_level) {
                            Some(level) => {
                                body.blocks.push(format!("{} {}", "#".repeat(level), text))
                            }
                            None => body.blocks.push(text),
                        }
                    }
                }
                b"w:tc" if table_depth == 1 => {
                    let cell = table.cell.join(" ").replace('|', "\\|");
                    table.row.push(cell);
                    table.cell.clear();
                }
                b"w:tr" if table_depth == 1 => {
                    let row = std::mem::take(&mut table.row);
                    if row.iter().any(|c| !c.is_empty()) {
                        table.rows.push(row);
                    }
                }
                b"w:tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 && !table.rows.is_empty() {
                        body.tables += 1;
                        body.blocks.push(render_table(&table.rows));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
    }

    Ok(body)
}

fn render_table(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| format!("| {} |", row.join(" | ")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Scope</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">Deliver the </w:t></w:r><w:r><w:t>MVP &amp; docs</w:t></w:r></w:p>
    <w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr><w:r><w:t>Team</w:t></w:r></w:p>
    <w:tbl>
      <w:tr><w:tc><w:p><w:r><w:t>Name</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Role</w:t></w:r></w:p></w:tc></w:tr>
      <w:tr><w:tc><w:p><w:r><w:t>Dana</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Owner</w:t></w:r></w:p></w:tc></w:tr>
    </w:tbl>
  </w:body>
</w:document>"#;

    #[test]
    fn headings_paragraphs_and_tables() {
        let body = parse_document_xml(XML).unwrap();
        assert_eq!(
            body.blocks,
            vec![
                "# Scope".to_string(),
                "Deliver the MVP & docs".to_string(),
                "## Team".to_string(),
                "| Name | Role |\n| Dana | Owner |".to_string(),
            ]
        );
        assert_eq!(body.paragraphs, 3);
        assert_eq!(body.tables, 1);
    }

    #[test]
    fn heading_levels_from_style_names() {
        assert_eq!(heading_level("Heading1"), Some(1));
        assert_eq!(heading_level("heading 3"), Some(3));
        assert_eq!(heading_level("Heading9"), Some(6));
        assert_eq!(heading_level("Title"), Some(1));
        assert_eq!(heading_level("Normal"), None);
    }

    #[test]
    fn non_zip_bytes_are_an_error() {
        assert!(matches!(extract(b"not a zip"), Err(ExtractError::Docx(_))));
    }
}
