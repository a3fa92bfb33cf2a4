use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerIndex, PdfPageIndex};

use super::docx::{parse_blocks, DocxBlock, Run};
use super::RenderError;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const BODY_PT: f32 = 11.0;
const PT_TO_MM: f32 = 0.3528;

/// Builtin PDF fonts only carry Latin-1 glyphs.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' | '\u{2022}' => '-',
            c if (c as u32) < 0x100 => c,
            _ => '?',
        })
        .collect()
}

fn runs_text(runs: &[Run]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

/// Greedy word wrap to at most `width` characters per line.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let needed = if line.is_empty() { 0 } else { 1 } + word.chars().count();
        if !line.is_empty() && line.chars().count() + needed > width {
            lines.push(std::mem::take(&mut line));
        }
        let mut word = word.to_string();
        while word.chars().count() > width {
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            lines.push(head);
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

struct Line {
    text: String,
    size: f32,
    bold: bool,
    indent_mm: f32,
}

fn layout(title: &str, markdown: &str) -> Vec<Line> {
    let chars_for = |size: f32, indent: f32| {
        let usable = PAGE_WIDTH_MM - 2.0 * MARGIN_MM - indent;
        (usable / (size * 0.5 * PT_TO_MM)) as usize
    };
    let mut lines = Vec::new();
    let mut push = |text: &str, size: f32, bold: bool, indent_mm: f32| {
        for piece in wrap(&sanitize(text), chars_for(size, indent_mm)) {
            lines.push(Line {
                text: piece,
                size,
                bold,
                indent_mm,
            });
        }
    };

    push(title, 18.0, true, 0.0);
    let mut number = 0usize;
    for block in parse_blocks(markdown) {
        if !matches!(block, DocxBlock::Numbered(_)) {
            number = 0;
        }
        match block {
            DocxBlock::Heading { level, runs } => {
                let size = (16.0 - level as f32).max(BODY_PT);
                push(&runs_text(&runs), size, true, 0.0);
            }
            DocxBlock::Bullet(runs) => push(&format!("- {}", runs_text(&runs)), BODY_PT, false, 5.0),
            DocxBlock::Numbered(runs) => {
                number += 1;
                push(&format!("{}. {}", number, runs_text(&runs)), BODY_PT, false, 5.0)
            }
            DocxBlock::Table { header, rows } => {
                push(&header.join(" | "), BODY_PT, true, 0.0);
                for row in rows {
                    push(&row.join(" | "), BODY_PT, false, 0.0);
                }
            }
            DocxBlock::Code(text) => {
                for line in text.lines() {
                    push(line, BODY_PT - 1.0, false, 8.0);
                }
            }
            DocxBlock::Paragraph(runs) => push(&runs_text(&runs), BODY_PT, false, 0.0),
        }
    }
    lines
}

struct PageCursor {
    page: PdfPageIndex,
    layer: PdfLayerIndex,
    y: f32,
}

fn new_page(doc: &PdfDocumentReference) -> PageCursor {
    let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    PageCursor {
        page,
        layer,
        y: PAGE_HEIGHT_MM - MARGIN_MM,
    }
}

/// Render markdown to a paginated PDF using builtin Helvetica.
pub fn render_pdf(title: &str, markdown: &str) -> Result<Vec<u8>, RenderError> {
    let (doc, page, layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let regular: IndirectFontRef = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    let bold: IndirectFontRef = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;

    let mut cursor = PageCursor {
        page,
        layer,
        y: PAGE_HEIGHT_MM - MARGIN_MM,
    };
    for line in layout(title, markdown) {
        let height = line.size * PT_TO_MM * 1.5;
        if cursor.y - height < MARGIN_MM {
            cursor = new_page(&doc);
        }
        cursor.y -= height;
        let font = if line.bold { &bold } else { &regular };
        doc.get_page(cursor.page).get_layer(cursor.layer).use_text(
            line.text,
            line.size,
            Mm(MARGIN_MM + line.indent_mm),
            Mm(cursor.y),
            font,
        );
    }

    doc.save_to_bytes()
        .map_err(|e| RenderError::Pdf(e.to_string()))
}
