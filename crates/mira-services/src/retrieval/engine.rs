use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use super::VectorIndex;
use crate::providers::{EmbeddingProvider, ProviderError};

/// Results for interactive questions.
pub const INTERACTIVE_K: usize = 4;
/// Results for the whole-plan coverage sweep.
pub const PLAN_SWEEP_K: usize = 20;
pub const PLAN_SWEEP_QUERY: &str = "project requirements timeline deliverables team milestones";

/// A retrieved passage with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub source: String,
    /// 0-based chunk position within `source`.
    pub ordinal: usize,
    pub total: usize,
    pub distance: f32,
}

/// `IndexMissing` means nothing has been indexed in this session;
/// `Results(vec![])` means the index exists but nothing matched.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    IndexMissing,
    Results(Vec<SearchHit>),
}

impl SearchOutcome {
    pub fn hits(&self) -> &[SearchHit] {
        match self {
            SearchOutcome::IndexMissing => &[],
            SearchOutcome::Results(hits) => hits,
        }
    }

    pub fn is_index_missing(&self) -> bool {
        matches!(self, SearchOutcome::IndexMissing)
    }
}

/// Nearest-neighbour search over a session's index.
#[derive(Clone)]
pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder }
    }

    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        self.embedder.clone()
    }

    /// Embed `query` and return the `k` nearest chunks.
    ///
    /// An absent or empty index yields [`SearchOutcome::IndexMissing`]
    /// without calling the embedding provider.
    pub async fn search(
        &self,
        index: Option<&VectorIndex>,
        query: &str,
        k: usize,
    ) -> Result<SearchOutcome, ProviderError> {
        let index = match index {
            Some(index) if !index.is_empty() => index,
            _ => return Ok(SearchOutcome::IndexMissing),
        };

        let start = Instant::now();
        let query_vector = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode {
                service: "OpenAI",
                message: "embedding response contained no vectors".to_string(),
            })?;

        let hits: Vec<SearchHit> = index
            .nearest(&query_vector, k)
            .into_iter()
            .map(|(entry, distance)| SearchHit {
                text: entry.text.clone(),
                source: entry.source.clone(),
                ordinal: entry.ordinal,
                total: entry.total,
                distance,
            })
            .collect();

        tracing::debug!(
            k,
            hits = hits.len(),
            indexed = index.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Vector search completed"
        );
        Ok(SearchOutcome::Results(hits))
    }
}

/// Render hits as numbered, cited passages.
pub fn format_search_results(hits: &[SearchHit]) -> String {
    let mut output = format!("📚 **Found {} relevant sections:**\n\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        output.push_str(&format!("### 📄 Source {}: `{}`\n", i + 1, hit.source));
        output.push_str(&format!(
            "**Section:** {} of {}\n\n",
            hit.ordinal + 1,
            hit.total
        ));
        output.push_str(&format!("> {}\n\n", hit.text));
        output.push_str("---\n\n");
    }
    output.push_str(
        "*💡 Use the information above to answer the user's question. Always cite the source document names.*",
    );
    output
}
