use mira_processing::{split_into_chunks, ChunkConfig};
use mira_services::test_helpers::KeywordEmbedder;
use mira_services::VectorIndex;

/// Index `docs` with the keyword embedder's vectors.
pub fn keyword_index(embedder: &KeywordEmbedder, docs: &[(&str, &str)]) -> VectorIndex {
    let mut index = VectorIndex::new("test");
    for (name, text) in docs {
        for chunk in split_into_chunks(text, name, &ChunkConfig::default()) {
            index.insert(&chunk, embedder.vector_for(&chunk.text));
        }
    }
    index
}
