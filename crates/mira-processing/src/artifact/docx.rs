//! Line-oriented markdown to DOCX rendering
//!
//! Headings map to heading styles, bullet and numbered lines to list styles,
//! consecutive pipe-delimited lines to a real table and fenced code to a
//! quote style. `**bold**` spans become bold runs.

use quick_xml::escape::escape;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

use super::RenderError;

/// A span of paragraph text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocxBlock {
    Heading { level: usize, runs: Vec<Run> },
    Bullet(Vec<Run>),
    Numbered(Vec<Run>),
    Table {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Code(String),
    Paragraph(Vec<Run>),
}

/// Split `**bold**` markers into runs. An unmatched marker is kept as text.
fn parse_runs(text: &str) -> Vec<Run> {
    let parts: Vec<&str> = text.split("**").collect();
    let balanced = parts.len() % 2 == 1;
    let mut runs = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        let bold = balanced && i % 2 == 1;
        let text = if !balanced && i > 0 {
            format!("**{}", part)
        } else {
            part.to_string()
        };
        runs.push(Run { text, bold });
    }
    runs
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    line[level..].strip_prefix(' ').map(|rest| (level, rest.trim()))
}

fn numbered(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..]
        .strip_prefix(". ")
        .or_else(|| line[digits..].strip_prefix(") "))
}

fn table_cells(line: &str) -> Vec<String> {
    let inner = line.trim().trim_start_matches('|').trim_end_matches('|');
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

fn is_separator_row(cells: &[String]) -> bool {
    cells.iter().all(|c| {
        !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' '))
    })
}

fn flush_table(table: &mut Vec<Vec<String>>, blocks: &mut Vec<DocxBlock>) {
    let mut rows = std::mem::take(table).into_iter();
    if let Some(header) = rows.next() {
        blocks.push(DocxBlock::Table {
            header,
            rows: rows.collect(),
        });
    }
}

/// Classify markdown lines into document blocks.
pub fn parse_blocks(markdown: &str) -> Vec<DocxBlock> {
    let mut blocks = Vec::new();
    let mut table: Vec<Vec<String>> = Vec::new();
    let mut code: Option<Vec<&str>> = None;

    for raw in markdown.lines() {
        let line = raw.trim();

        if let Some(lines) = code.as_mut() {
            if line.starts_with("```") {
                blocks.push(DocxBlock::Code(lines.join("\n")));
                code = None;
            } else {
                lines.push(raw);
            }
            continue;
        }

        if line.starts_with('|') {
            let cells = table_cells(line);
            if !is_separator_row(&cells) {
                table.push(cells);
            }
            continue;
        }
        flush_table(&mut table, &mut blocks);

        if line.starts_with("```") {
            code = Some(Vec::new());
        } else if line.is_empty() || line == "---" || line == "***" {
            continue;
        } else if let Some((level, text)) = heading(line) {
            blocks.push(DocxBlock::Heading {
                level,
                runs: parse_runs(text),
            });
        } else if let Some(text) = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .or_else(|| line.strip_prefix("+ "))
        {
            blocks.push(DocxBlock::Bullet(parse_runs(text.trim())));
        } else if let Some(text) = numbered(line) {
            blocks.push(DocxBlock::Numbered(parse_runs(text.trim())));
        } else {
            blocks.push(DocxBlock::Paragraph(parse_runs(line)));
        }
    }

    flush_table(&mut table, &mut blocks);
    if let Some(lines) = code {
        blocks.push(DocxBlock::Code(lines.join("\n")));
    }
    blocks
}

fn run_xml(run: &Run) -> String {
    let props = if run.bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
    format!(
        r#"<w:r>{}<w:t xml:space="preserve">{}</w:t></w:r>"#,
        props,
        escape(run.text.as_str())
    )
}

fn paragraph_xml(style: Option<&str>, numbering: Option<u32>, runs: &[Run]) -> String {
    let mut props = String::new();
    if let Some(style) = style {
        props.push_str(&format!(r#"<w:pStyle w:val="{}"/>"#, style));
    }
    if let Some(num_id) = numbering {
        props.push_str(&format!(
            r#"<w:numPr><w:ilvl w:val="0"/><w:numId w:val="{}"/></w:numPr>"#,
            num_id
        ));
    }
    let props = if props.is_empty() {
        String::new()
    } else {
        format!("<w:pPr>{}</w:pPr>", props)
    };
    let body: String = runs.iter().map(run_xml).collect();
    format!("<w:p>{}{}</w:p>", props, body)
}

fn cell_xml(text: &str, bold: bool) -> String {
    format!(
        "<w:tc>{}</w:tc>",
        paragraph_xml(
            None,
            None,
            &parse_runs(text)
                .into_iter()
                .map(|r| Run {
                    bold: bold || r.bold,
                    ..r
                })
                .collect::<Vec<_>>()
        )
    )
}

fn table_xml(header: &[String], rows: &[Vec<String>]) -> String {
    let columns = header.len().max(1);
    let mut xml = String::from(r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="0" w:type="auto"/></w:tblPr><w:tblGrid>"#);
    for _ in 0..columns {
        xml.push_str("<w:gridCol/>");
    }
    xml.push_str("</w:tblGrid>");

    xml.push_str("<w:tr>");
    for cell in header {
        xml.push_str(&cell_xml(cell, true));
    }
    xml.push_str("</w:tr>");

    for row in rows {
        xml.push_str("<w:tr>");
        for i in 0..columns {
            xml.push_str(&cell_xml(row.get(i).map(String::as_str).unwrap_or(""), false));
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
    xml
}

const BULLET_NUM_ID: u32 = 1;
const DECIMAL_NUM_ID: u32 = 2;

fn document_xml(blocks: &[DocxBlock]) -> String {
    let mut body = String::new();
    for block in blocks {
        match block {
            DocxBlock::Heading { level, runs } => {
                let style = format!("Heading{}", level);
                body.push_str(&paragraph_xml(Some(&style), None, runs));
            }
            DocxBlock::Bullet(runs) => {
                body.push_str(&paragraph_xml(Some("ListBullet"), Some(BULLET_NUM_ID), runs))
            }
            DocxBlock::Numbered(runs) => {
                body.push_str(&paragraph_xml(Some("ListNumber"), Some(DECIMAL_NUM_ID), runs))
            }
            DocxBlock::Table { header, rows } => {
                body.push_str(&table_xml(header, rows));
                body.push_str("<w:p/>");
            }
            DocxBlock::Code(text) => {
                for line in text.lines() {
                    let run = Run {
                        text: line.to_string(),
                        bold: false,
                    };
                    body.push_str(&paragraph_xml(Some("Quote"), None, &[run]));
                }
            }
            DocxBlock::Paragraph(runs) => body.push_str(&paragraph_xml(None, None, runs)),
        }
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#,
        body
    )
}

fn styles_xml() -> String {
    let mut styles = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:rPr><w:sz w:val="22"/></w:rPr></w:style>"#,
    );
    for level in 1..=6 {
        let size = 36 - (level as u32 - 1) * 4;
        styles.push_str(&format!(
            r#"<w:style w:type="paragraph" w:styleId="Heading{level}"><w:name w:val="heading {level}"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="{outline}"/></w:pPr><w:rPr><w:b/><w:sz w:val="{size}"/></w:rPr></w:style>"#,
            level = level,
            outline = level - 1,
            size = size
        ));
    }
    styles.push_str(
        r#"<w:style w:type="paragraph" w:styleId="ListBullet"><w:name w:val="List Bullet"/><w:basedOn w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="ListNumber"><w:name w:val="List Number"/><w:basedOn w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Quote"><w:name w:val="Quote"/><w:basedOn w:val="Normal"/><w:pPr><w:ind w:left="720"/></w:pPr><w:rPr><w:i/><w:rFonts w:ascii="Courier New" w:hAnsi="Courier New"/></w:rPr></w:style><w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders></w:tblPr></w:style></w:styles>"#,
    );
    styles
}

const NUMBERING_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="&#8226;"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum><w:abstractNum w:abstractNumId="1"><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/><w:lvlText w:val="%1."/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num><w:num w:numId="2"><w:abstractNumId w:val="1"/></w:num></w:numbering>"#;

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/></Relationships>"#;

/// Render markdown to DOCX bytes.
pub fn render_docx(markdown: &str) -> Result<Vec<u8>, RenderError> {
    let blocks = parse_blocks(markdown);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();
    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", ROOT_RELS_XML.to_string()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML.to_string()),
        ("word/document.xml", document_xml(&blocks)),
        ("word/styles.xml", styles_xml()),
        ("word/numbering.xml", NUMBERING_XML.to_string()),
    ];
    for (name, content) in parts {
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}
