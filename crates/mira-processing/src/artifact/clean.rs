/// Strip a code fence wrapping the whole of a model response.
///
/// Models often answer with ```` ```markdown ... ``` ````; the fence is
/// removed so the content renders as a document rather than a code block.
pub fn clean_markdown(text: &str) -> String {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```markdown") {
        text = rest.trim_start();
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }
    text.to_string()
}
