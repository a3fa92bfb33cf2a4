//! Mira document processing
//!
//! Pure transforms over uploaded bytes and generated text: format
//! extraction, normalization, chunking, file-set fingerprints and rendering
//! of generated artifacts to markdown, text, PDF and DOCX.

pub mod artifact;
pub mod chunker;
pub mod document;
pub mod fingerprint;
pub mod pipeline;

pub use artifact::{clean_markdown, ArtifactOutputs, ArtifactWriter, RenderError, RenderedFile};
pub use chunker::{split_into_chunks, Chunk, ChunkConfig};
pub use document::{DocumentKind, ExtractError, ExtractMetadata, Extracted};
pub use fingerprint::{content_sha256, file_set_fingerprint};
pub use pipeline::{
    fingerprint_of, process_files, ExtractedDocument, FileDetail, FileStatus, ProcessedBatch,
    UploadedFile,
};
