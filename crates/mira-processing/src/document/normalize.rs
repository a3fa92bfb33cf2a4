/// Normalize line endings to `\n` and collapse runs of two or more blank
/// lines (whitespace-only lines included) into a single empty line.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<&str> = Vec::new();
    let mut pending_blank: Vec<&str> = Vec::new();

    for line in unified.split('\n') {
        if line.trim().is_empty() {
            pending_blank.push(line);
            continue;
        }
        flush_blank(&mut lines, &mut pending_blank);
        lines.push(line);
    }
    flush_blank(&mut lines, &mut pending_blank);

    lines.join("\n")
}

fn flush_blank<'a>(lines: &mut Vec<&'a str>, pending: &mut Vec<&'a str>) {
    if pending.len() >= 2 {
        lines.push("");
    } else {
        lines.append(pending);
    }
    pending.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unifies_line_endings() {
        assert_eq!(normalize_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(normalize_text("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize_text("a\n  \n\t\n\nb"), "a\n\nb");
    }

    #[test]
    fn keeps_single_blank_line() {
        assert_eq!(normalize_text("a\n\nb\nc"), "a\n\nb\nc");
        assert_eq!(normalize_text("a\n \nb"), "a\n \nb");
    }
}
