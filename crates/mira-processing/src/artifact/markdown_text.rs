use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

/// Render markdown as readable plain text: emphasis markers removed,
/// headings and list items on their own lines, table cells separated by tabs.
pub fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::new();
    let mut list_stack: Vec<Option<u64>> = Vec::new();

    for event in Parser::new_ext(markdown, Options::ENABLE_TABLES) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Start(Tag::Item) => {
                let indent = "  ".repeat(list_stack.len().saturating_sub(1));
                match list_stack.last_mut() {
                    Some(Some(n)) => {
                        out.push_str(&format!("{}{}. ", indent, n));
                        *n += 1;
                    }
                    _ => out.push_str(&format!("{}- ", indent)),
                }
            }
            Event::Start(Tag::List(start)) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                list_stack.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                list_stack.pop();
                if list_stack.is_empty() {
                    out.push('\n');
                }
            }
            Event::End(TagEnd::Item) | Event::End(TagEnd::TableRow) | Event::End(TagEnd::TableHead) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::End(TagEnd::TableCell) => out.push('\t'),
            Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::CodeBlock)
            | Event::End(TagEnd::Table) => {
                if list_stack.is_empty() {
                    out.push_str("\n\n");
                } else if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::Rule => out.push_str("\n\n"),
            _ => {}
        }
    }

    let lines: Vec<&str> = out.lines().map(str::trim_end).collect();
    crate::document::normalize_text(&lines.join("\n"))
        .trim()
        .to_string()
}
