//! Session-scoped vector index and nearest-neighbour retrieval

mod engine;
mod index;
mod indexer;

pub use engine::{
    format_search_results, RetrievalEngine, SearchHit, SearchOutcome, INTERACTIVE_K, PLAN_SWEEP_K,
    PLAN_SWEEP_QUERY,
};
pub use index::{IndexEntry, VectorIndex};
pub use indexer::{IndexReport, Indexer, EMBEDDING_BATCH_SIZE};
