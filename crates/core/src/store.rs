use crate::error::StoreError;
use crate::models::{Chunk, RetrievedChunk};
use async_trait::async_trait;

/// Where a batch of chunks came from; recorded on every stored record.
#[derive(Debug, Clone)]
pub struct ChunkSource<'a> {
    pub document_id: &'a str,
    pub source: &'a str,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embeds and persists `chunks` as one batch, returning the new record ids.
    async fn add_chunks(
        &self,
        origin: ChunkSource<'_>,
        chunks: &[Chunk],
    ) -> Result<Vec<String>, StoreError>;

    /// Returns up to `k` records ordered by descending similarity to `query`.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError>;

    /// Number of stored records. Zero is a valid, ready state.
    async fn record_count(&self) -> usize;
}
