use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use mira_processing::{
    fingerprint_of, process_files, split_into_chunks, Chunk, ChunkConfig, ExtractedDocument,
    FileDetail, UploadedFile,
};

use super::VectorIndex;
use crate::providers::EmbeddingProvider;

/// Inputs per embedding request.
pub const EMBEDDING_BATCH_SIZE: usize = 64;

/// What an indexing pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub fingerprint: String,
    /// The existing index matched the file set and was kept.
    pub reused: bool,
    pub chunks: usize,
    pub embedded: usize,
    pub dropped: usize,
    /// Per-file outcomes; empty when the index was reused.
    pub file_details: Vec<FileDetail>,
}

/// Builds session indexes from uploaded files.
#[derive(Clone)]
pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    chunking: ChunkConfig,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, chunking: ChunkConfig) -> Self {
        Self { embedder, chunking }
    }

    /// Bring `current` in line with `files`.
    ///
    /// When the fingerprint of `files` equals the fingerprint `current` was
    /// built from, nothing is embedded. Otherwise the files are processed,
    /// chunked and embedded into a fresh index that replaces `current`.
    /// No files clears the index.
    pub async fn ensure_index(
        &self,
        current: &mut Option<VectorIndex>,
        files: &[UploadedFile],
    ) -> IndexReport {
        if files.is_empty() {
            *current = None;
            return IndexReport::default();
        }

        let fingerprint = fingerprint_of(files);
        if let Some(index) = current.as_ref().filter(|i| i.fingerprint() == fingerprint) {
            tracing::debug!(fingerprint = %fingerprint, "File set unchanged, reusing index");
            return IndexReport {
                fingerprint,
                reused: true,
                chunks: index.len(),
                embedded: index.len(),
                ..Default::default()
            };
        }

        let batch = process_files(files).await;
        let (index, mut report) = self.build_index(&batch.fingerprint, &batch.documents).await;
        report.file_details = batch.file_details;
        *current = Some(index);
        report
    }

    /// Chunk and embed `documents` into a new index tagged with `fingerprint`.
    /// Chunks whose embedding fails are dropped with a warning.
    pub async fn build_index(
        &self,
        fingerprint: &str,
        documents: &[ExtractedDocument],
    ) -> (VectorIndex, IndexReport) {
        let start = Instant::now();
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| split_into_chunks(&doc.extracted.text, &doc.name, &self.chunking))
            .collect();

        let mut index = VectorIndex::new(fingerprint);
        let mut dropped = 0;
        for batch in chunks.chunks(EMBEDDING_BATCH_SIZE) {
            for (chunk, vector) in self.embed_batch(batch).await {
                if !vector.is_some_and(|vector| index.insert(chunk, vector)) {
                    dropped += 1;
                }
            }
        }

        let report = IndexReport {
            fingerprint: fingerprint.to_string(),
            reused: false,
            chunks: chunks.len(),
            embedded: index.len(),
            dropped,
            file_details: Vec::new(),
        };
        tracing::info!(
            documents = documents.len(),
            chunks = report.chunks,
            embedded = report.embedded,
            dropped = report.dropped,
            model = %self.embedder.model_name(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Vector index built"
        );
        (index, report)
    }

    /// Embed a batch in one request, falling back to one request per chunk
    /// when the batch call fails.
    async fn embed_batch<'a>(&self, batch: &'a [Chunk]) -> Vec<(&'a Chunk, Option<Vec<f32>>)> {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        match self.embedder.embed(&texts).await {
            Ok(vectors) if vectors.len() == batch.len() => {
                return batch.iter().zip(vectors.into_iter().map(Some)).collect();
            }
            Ok(vectors) => tracing::warn!(
                expected = batch.len(),
                received = vectors.len(),
                "Embedding batch returned wrong count, retrying per chunk"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                batch_size = batch.len(),
                "Embedding batch failed, retrying per chunk"
            ),
        }

        let mut out = Vec::with_capacity(batch.len());
        for chunk in batch {
            let vector = match self.embedder.embed(std::slice::from_ref(&chunk.text)).await {
                Ok(mut vectors) if vectors.len() == 1 => vectors.pop(),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        source = %chunk.source,
                        ordinal = chunk.ordinal,
                        "Dropping chunk that failed to embed"
                    );
                    None
                }
            };
            out.push((chunk, vector));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::KeywordEmbedder;
    use mira_processing::FileStatus;

    fn indexer(embedder: Arc<KeywordEmbedder>) -> Indexer {
        Indexer::new(embedder, ChunkConfig::default())
    }

    fn files() -> Vec<UploadedFile> {
        vec![
            UploadedFile::new("plan.txt", b"Milestone 1: Launch by March 1. Owner: Dana.".to_vec()),
            UploadedFile::new("notes.md", b"Risks: vendor delay.".to_vec()),
        ]
    }

    #[tokio::test]
    async fn unchanged_file_set_is_not_reembedded() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let indexer = indexer(embedder.clone());
        let mut current = None;

        let first = indexer.ensure_index(&mut current, &files()).await;
        assert!(!first.reused);
        assert_eq!(first.embedded, 2);
        assert_eq!(first.file_details.len(), 2);
        assert!(first
            .file_details
            .iter()
            .all(|d| d.status == FileStatus::Processed));
        let calls = embedder.calls();
        assert!(calls > 0);

        let second = indexer.ensure_index(&mut current, &files()).await;
        assert!(second.reused);
        assert_eq!(second.fingerprint, first.fingerprint);
        assert_eq!(embedder.calls(), calls);
    }

    #[tokio::test]
    async fn changed_content_rebuilds() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let indexer = indexer(embedder.clone());
        let mut current = None;
        indexer.ensure_index(&mut current, &files()).await;

        let mut changed = files();
        changed[1] = UploadedFile::new("notes.md", b"Risks: vendor slips.".to_vec());
        let report = indexer.ensure_index(&mut current, &changed).await;
        assert!(!report.reused);
        assert_eq!(current.as_ref().map(|i| i.fingerprint()), Some(report.fingerprint.as_str()));
    }

    #[tokio::test]
    async fn no_files_clears_index() {
        let indexer = indexer(Arc::new(KeywordEmbedder::default()));
        let mut current = None;
        indexer.ensure_index(&mut current, &files()).await;
        assert!(current.is_some());

        indexer.ensure_index(&mut current, &[]).await;
        assert!(current.is_none());
    }

    #[tokio::test]
    async fn failing_chunks_are_dropped_not_fatal() {
        let embedder = Arc::new(KeywordEmbedder::default().failing_on("POISON"));
        let indexer = indexer(embedder.clone());
        let mut current = None;
        let files = vec![
            UploadedFile::new("good.txt", b"Deliverables: API and docs.".to_vec()),
            UploadedFile::new("bad.txt", b"POISON content".to_vec()),
        ];

        let report = indexer.ensure_index(&mut current, &files).await;
        assert_eq!(report.chunks, 2);
        assert_eq!(report.embedded, 1);
        assert_eq!(report.dropped, 1);
        let index = current.unwrap();
        assert_eq!(index.sources(), vec!["good.txt"]);
        // one failed batch call, then one call per chunk
        assert_eq!(embedder.calls(), 3);
    }

    #[tokio::test]
    async fn unreadable_files_produce_no_chunks() {
        let indexer = indexer(Arc::new(KeywordEmbedder::default()));
        let mut current = None;
        let files = vec![
            UploadedFile::new("empty.txt", Vec::new()),
            UploadedFile::new("image.png", vec![0x89, 0x50]),
        ];
        let report = indexer.ensure_index(&mut current, &files).await;
        assert_eq!(report.chunks, 0);
        assert!(current.map(|i| i.is_empty()).unwrap_or(false));
    }
}
