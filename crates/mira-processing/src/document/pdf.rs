use super::{ExtractError, ExtractMetadata, Extracted};

/// Extract PDF text page by page, marking each page boundary.
pub(super) fn extract(bytes: &[u8]) -> Result<Extracted, ExtractError> {
    if !bytes.starts_with(b"%PDF") {
        return Err(ExtractError::Pdf("missing %PDF header".to_string()));
    }

    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    Ok(Extracted {
        text: render_pages(&pages),
        metadata: ExtractMetadata {
            page_count: Some(pages.len()),
            ..Default::default()
        },
    })
}

fn render_pages(pages: &[String]) -> String {
    pages
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| format!("--- Page {} ---\n{}", i + 1, text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_pdf_bytes() {
        assert!(matches!(
            extract(b"hello world"),
            Err(ExtractError::Pdf(_))
        ));
    }

    #[test]
    fn page_markers_skip_blank_pages() {
        let pages = vec![
            "Scope".to_string(),
            "   ".to_string(),
            " Timeline \n".to_string(),
        ];
        assert_eq!(
            render_pages(&pages),
            "--- Page 1 ---\nScope\n\n--- Page 3 ---\nTimeline"
        );
    }
}
