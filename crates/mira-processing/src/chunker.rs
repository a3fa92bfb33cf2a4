use serde::Serialize;

/// Configuration for text chunking.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Target maximum length per chunk, in characters.
    pub chunk_size: usize,
    /// Characters repeated from the end of one chunk at the start of the next.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// A slice of one document's text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub text: String,
    /// Source document name.
    pub source: String,
    /// 0-based position within the source.
    pub ordinal: usize,
    /// Number of chunks produced for the source.
    pub total: usize,
    /// Byte offset of `text` within the source text.
    pub start: usize,
}

/// Break preference inside a window, strongest first.
const PARAGRAPH_BREAKS: &[&str] = &["\n\n"];
const SENTENCE_BREAKS: &[&str] = &[". ", "! ", "? ", ".\n", "!\n", "?\n", "\n"];
const WORD_BREAKS: &[&str] = &[" ", "\t"];

/// End of the last separator occurrence in `window`, searching only past
/// `min_end` so the next chunk still makes progress.
fn last_break(window: &str, separators: &[&str], min_end: usize) -> Option<usize> {
    separators
        .iter()
        .filter_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
        .filter(|&end| end > min_end)
        .max()
}

/// Split text into overlapping windows of about `chunk_size` characters.
///
/// Each window ends at the last paragraph break inside it, else the last
/// sentence end, else the last space; only when none exists is the text
/// split at the window edge. Consecutive chunks share up to
/// `chunk_overlap` characters, and every chunk is an exact slice of the
/// input, so dropping each chunk's overlap and concatenating reproduces
/// `text`. Empty or whitespace-only text produces no chunks.
pub fn split_into_chunks(text: &str, source: &str, config: &ChunkConfig) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return vec![];
    }

    // Byte offset of every char, plus the end of the text.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = offsets.len() - 1;

    let size = config.chunk_size.max(1);
    let overlap = config.chunk_overlap.min(size.saturating_sub(1));
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;

    while start < char_count {
        let end = if char_count - start <= size {
            char_count
        } else {
            let hard_end = start + size;
            let window = &text[offsets[start]..offsets[hard_end]];
            let min_end = offsets[start + overlap] - offsets[start];

            last_break(window, PARAGRAPH_BREAKS, min_end)
                .or_else(|| last_break(window, SENTENCE_BREAKS, min_end))
                .or_else(|| last_break(window, WORD_BREAKS, min_end))
                .and_then(|rel| offsets.binary_search(&(offsets[start] + rel)).ok())
                .unwrap_or(hard_end)
        };

        spans.push((offsets[start], offsets[end]));
        if end >= char_count {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { start + 1 };
    }

    let total = spans.len();
    spans
        .into_iter()
        .enumerate()
        .map(|(ordinal, (start, end))| Chunk {
            text: text[start..end].to_string(),
            source: source.to_string(),
            ordinal,
            total,
            start,
        })
        .collect()
}

/// Rebuild the source text from its chunks by dropping each overlap.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered = 0;
    for chunk in chunks {
        let end = chunk.start + chunk.text.len();
        if end <= covered {
            continue;
        }
        let skip = covered.saturating_sub(chunk.start);
        out.push_str(&chunk.text[skip..]);
        covered = end;
    }
    out
}
