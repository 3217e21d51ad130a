pub mod chunking;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod provision;
pub mod query;
pub mod store;
pub mod stores;

#[cfg(test)]
mod test_fixtures;

pub use chunking::{normalize_whitespace, Chunker, ChunkingConfig};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use engine::{BoxError, ComponentFactory, Components, LocalComponents, RagEngine, Readiness};
pub use error::{
    DownloadError, GenerationError, IngestError, InitError, InitStage, QueryError, StoreError,
};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use generation::{GenerationModel, LlamaServerModel};
pub use ingest::{discover_pdf_files, has_pdf_extension, IngestionReport, SkippedPdf};
pub use models::{
    Chunk, EmbeddingRecord, EngineConfig, GenerationOptions, IngestionOptions, RetrievedChunk,
};
pub use provision::{ensure_model_available, ModelProvisioner, ProvisionOutcome};
pub use query::{QueryEngine, FALLBACK_ANSWER, NO_ANSWER};
pub use store::{ChunkSource, VectorStore};
pub use stores::LocalVectorStore;
