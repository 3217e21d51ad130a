use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::StoreError;
use crate::models::{Chunk, EmbeddingRecord, RetrievedChunk};
use crate::store::{ChunkSource, VectorStore};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

const COLLECTION_FILE: &str = "collection.json";
const COLLECTION_VERSION: u32 = 1;

/// Append-only vector collection persisted as one JSON file inside `directory`.
pub struct LocalVectorStore {
    directory: PathBuf,
    embedder: Arc<dyn Embedder>,
    records: RwLock<Vec<EmbeddingRecord>>,
}

#[derive(Serialize)]
struct PersistedCollection<'a> {
    version: u32,
    model: &'a str,
    dimensions: usize,
    records: &'a [EmbeddingRecord],
}

#[derive(Deserialize)]
struct StoredCollection {
    #[allow(dead_code)]
    version: u32,
    model: String,
    dimensions: usize,
    records: Vec<EmbeddingRecord>,
}

impl LocalVectorStore {
    pub async fn open(
        directory: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, StoreError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;

        let path = directory.join(COLLECTION_FILE);
        let records = if tokio::fs::try_exists(&path).await? {
            let bytes = tokio::fs::read(&path).await?;
            let stored: StoredCollection = serde_json::from_slice(&bytes)?;

            if stored.model != embedder.model_name() || stored.dimensions != embedder.dimensions()
            {
                return Err(StoreError::IncompatibleCollection {
                    path: path.display().to_string(),
                    found: format!("{}/{}", stored.model, stored.dimensions),
                    expected: format!("{}/{}", embedder.model_name(), embedder.dimensions()),
                });
            }

            info!(path = %path.display(), records = stored.records.len(), "loaded vector collection");
            stored.records
        } else {
            info!(path = %path.display(), "starting empty vector collection");
            Vec::new()
        };

        Ok(Self {
            directory,
            embedder,
            records: RwLock::new(records),
        })
    }

    async fn persist(&self, records: &[EmbeddingRecord]) -> Result<(), StoreError> {
        let payload = PersistedCollection {
            version: COLLECTION_VERSION,
            model: self.embedder.model_name(),
            dimensions: self.embedder.dimensions(),
            records,
        };
        let bytes = serde_json::to_vec(&payload)?;

        let target = self.directory.join(COLLECTION_FILE);
        let staging = self.directory.join(format!("{COLLECTION_FILE}.tmp"));
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &target).await?;
        debug!(path = %target.display(), records = records.len(), "persisted vector collection");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn add_chunks(
        &self,
        origin: ChunkSource<'_>,
        chunks: &[Chunk],
    ) -> Result<Vec<String>, StoreError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts = chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>();
        let embeddings = self.embedder.embed_batch(&texts);
        let expected = self.embedder.dimensions();
        if let Some(bad) = embeddings.iter().find(|vector| vector.len() != expected) {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        let ingested_at = Utc::now();
        let new_records = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddingRecord {
                id: Uuid::new_v4().to_string(),
                document_id: origin.document_id.to_string(),
                source: origin.source.to_string(),
                page: chunk.page,
                chunk_index: chunk.chunk_index,
                text: chunk.text.clone(),
                embedding,
                ingested_at,
            })
            .collect::<Vec<_>>();
        let ids = new_records.iter().map(|record| record.id.clone()).collect();

        let mut records = self.records.write().await;
        let previous_len = records.len();
        records.extend(new_records);

        if let Err(error) = self.persist(&records).await {
            records.truncate(previous_len);
            return Err(error);
        }

        Ok(ids)
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query);
        let records = self.records.read().await;

        let mut scored = records
            .iter()
            .map(|record| (cosine_similarity(&query_vector, &record.embedding), record))
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| right.0.total_cmp(&left.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, record)| RetrievedChunk {
                id: record.id.clone(),
                source: record.source.clone(),
                page: record.page,
                text: record.text.clone(),
                score,
            })
            .collect())
    }

    async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use tempfile::tempdir;

    fn chunk(index: u64, text: &str) -> Chunk {
        Chunk {
            chunk_index: index,
            page: Some(1),
            offset: 0,
            text: text.to_string(),
        }
    }

    fn origin() -> ChunkSource<'static> {
        ChunkSource {
            document_id: "doc-1",
            source: "report.pdf",
        }
    }

    #[tokio::test]
    async fn open_creates_directory_and_starts_empty() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store_dir = dir.path().join("nested").join("store");

        let store =
            LocalVectorStore::open(&store_dir, Arc::new(CharacterNgramEmbedder::new(64))).await?;

        assert!(store_dir.is_dir());
        assert_eq!(store.record_count().await, 0);
        assert!(store.similarity_search("anything", 3).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn records_survive_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let embedder: Arc<dyn Embedder> = Arc::new(CharacterNgramEmbedder::new(64));

        let store = LocalVectorStore::open(dir.path(), embedder.clone()).await?;
        let ids = store
            .add_chunks(origin(), &[chunk(0, "first chunk"), chunk(1, "second chunk")])
            .await?;
        assert_eq!(ids.len(), 2);
        drop(store);

        let reopened = LocalVectorStore::open(dir.path(), embedder).await?;
        assert_eq!(reopened.record_count().await, 2);
        assert!(!dir.path().join("collection.json.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn store_only_grows() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store =
            LocalVectorStore::open(dir.path(), Arc::new(CharacterNgramEmbedder::new(64))).await?;

        store.add_chunks(origin(), &[chunk(0, "same text")]).await?;
        store.add_chunks(origin(), &[chunk(0, "same text")]).await?;

        assert_eq!(store.record_count().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store =
            LocalVectorStore::open(dir.path(), Arc::new(CharacterNgramEmbedder::default())).await?;
        store
            .add_chunks(
                origin(),
                &[
                    chunk(0, "The boiler must be serviced every twelve months."),
                    chunk(1, "Invoices are payable within thirty days of receipt."),
                    chunk(2, "Late invoices accrue interest on the payable amount."),
                ],
            )
            .await?;

        let hits = store.similarity_search("when are invoices payable", 2).await?;

        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|hit| hit.text.contains("nvoices")));
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].source, "report.pdf");
        assert!(store.similarity_search("invoices", 0).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn rejects_collection_from_other_embedder() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store =
            LocalVectorStore::open(dir.path(), Arc::new(CharacterNgramEmbedder::new(64))).await?;
        store.add_chunks(origin(), &[chunk(0, "text")]).await?;
        drop(store);

        let result =
            LocalVectorStore::open(dir.path(), Arc::new(CharacterNgramEmbedder::new(32))).await;

        assert!(matches!(
            result,
            Err(StoreError::IncompatibleCollection { .. })
        ));
        Ok(())
    }
}
