//! Lifecycle owner for the embedding function, vector store and generation model.
//!
//! A [`RagEngine`] is constructed empty, brought up once with
//! [`RagEngine::initialize`], and then shared with request handlers. Every
//! ingestion or query checks readiness first.

use crate::chunking::{Chunker, ChunkingConfig};
use crate::embeddings::{CharacterNgramEmbedder, Embedder};
use crate::error::{IngestError, InitError, InitStage, QueryError};
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::generation::{GenerationModel, LlamaServerModel};
use crate::ingest::{IngestionEngine, IngestionReport};
use crate::models::EngineConfig;
use crate::provision::ModelProvisioner;
use crate::query::QueryEngine;
use crate::store::VectorStore;
use crate::stores::LocalVectorStore;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Builds the three subsystems. Stages run strictly in declaration order.
#[async_trait]
pub trait ComponentFactory: Send + Sync {
    async fn provision_model(&self) -> Result<(), BoxError>;
    async fn load_embedder(&self) -> Result<Arc<dyn Embedder>, BoxError>;
    async fn open_store(&self, embedder: Arc<dyn Embedder>)
        -> Result<Arc<dyn VectorStore>, BoxError>;
    async fn load_model(&self) -> Result<Arc<dyn GenerationModel>, BoxError>;
}

#[derive(Clone)]
pub struct Components {
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub model: Arc<dyn GenerationModel>,
}

enum EngineState {
    Uninitialized,
    Initializing,
    Ready(Components),
    Failed(InitError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Uninitialized,
    Initializing,
    Ready,
    Failed(String),
}

pub struct RagEngine {
    state: RwLock<EngineState>,
    ingestion: IngestionEngine,
    query: QueryEngine,
}

impl RagEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, IngestError> {
        Self::with_extractor(config, Arc::new(LopdfExtractor))
    }

    pub fn with_extractor(
        config: &EngineConfig,
        extractor: Arc<dyn PdfExtractor>,
    ) -> Result<Self, IngestError> {
        let chunker = Chunker::new(ChunkingConfig::from(&config.ingestion))?;
        Ok(Self {
            state: RwLock::new(EngineState::Uninitialized),
            ingestion: IngestionEngine::new(extractor, chunker),
            query: QueryEngine::new(config.top_k),
        })
    }

    /// Runs provisioning, embedder, store and model stages in order. The first
    /// failing stage aborts the sequence and leaves the engine `Failed`.
    pub async fn initialize(&self, factory: &dyn ComponentFactory) -> Result<(), InitError> {
        {
            let mut state = self.write_state();
            if matches!(*state, EngineState::Ready(_) | EngineState::Initializing) {
                return Err(InitError::new(
                    InitStage::AlreadyInitialized,
                    "rag engine already initialized",
                ));
            }
            *state = EngineState::Initializing;
        }

        let outcome = bring_up(factory).await;

        let mut state = self.write_state();
        match outcome {
            Ok(components) => {
                info!("rag engine initialized successfully");
                *state = EngineState::Ready(components);
                Ok(())
            }
            Err(failure) => {
                error!(stage = %failure.stage, error = %failure.message, "rag engine failed to initialize");
                *state = EngineState::Failed(failure.clone());
                Err(failure)
            }
        }
    }

    /// True once every handle is present. An empty store still counts as ready.
    pub fn is_ready(&self) -> bool {
        matches!(*self.read_state(), EngineState::Ready(_))
    }

    pub fn status(&self) -> Readiness {
        match &*self.read_state() {
            EngineState::Uninitialized => Readiness::Uninitialized,
            EngineState::Initializing => Readiness::Initializing,
            EngineState::Ready(_) => Readiness::Ready,
            EngineState::Failed(failure) => Readiness::Failed(failure.to_string()),
        }
    }

    pub fn components(&self) -> Option<Components> {
        match &*self.read_state() {
            EngineState::Ready(components) => Some(components.clone()),
            _ => None,
        }
    }

    /// Ingests one PDF and returns the number of chunks stored.
    pub async fn ingest(&self, file_path: &Path, source_name: &str) -> Result<usize, IngestError> {
        let components = self.components().ok_or(IngestError::NotReady)?;
        self.ingestion
            .ingest(components.store.as_ref(), file_path, source_name)
            .await
    }

    pub async fn ingest_files(&self, files: &[PathBuf]) -> Result<IngestionReport, IngestError> {
        let components = self.components().ok_or(IngestError::NotReady)?;
        Ok(self
            .ingestion
            .ingest_best_effort(components.store.as_ref(), files)
            .await)
    }

    pub async fn answer(&self, question: &str) -> Result<String, QueryError> {
        if question.trim().is_empty() {
            return Err(QueryError::InvalidInput("please provide a question.".to_string()));
        }
        let components = self.components().ok_or(QueryError::NotReady)?;
        self.query
            .answer(components.store.as_ref(), components.model.as_ref(), question)
            .await
    }

    fn read_state(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn bring_up(factory: &dyn ComponentFactory) -> Result<Components, InitError> {
    factory
        .provision_model()
        .await
        .map_err(|source| stage_failed(InitStage::ProvisionModel, source))?;

    info!("loading embedding function");
    let embedder = factory
        .load_embedder()
        .await
        .map_err(|source| stage_failed(InitStage::LoadEmbedder, source))?;

    info!("connecting to vector store");
    let store = factory
        .open_store(embedder.clone())
        .await
        .map_err(|source| stage_failed(InitStage::OpenStore, source))?;
    info!(records = store.record_count().await, "vector store connected");

    info!("loading llm");
    let model = factory
        .load_model()
        .await
        .map_err(|source| stage_failed(InitStage::LoadModel, source))?;

    Ok(Components {
        embedder,
        store,
        model,
    })
}

fn stage_failed(stage: InitStage, source: BoxError) -> InitError {
    let failure = InitError::new(stage, source);
    error!("{failure}");
    failure
}

/// Production wiring: downloaded GGUF model, hashed embedder, on-disk store, llama.cpp server.
pub struct LocalComponents {
    config: EngineConfig,
    provisioner: ModelProvisioner,
}

impl LocalComponents {
    pub fn new(config: EngineConfig) -> Result<Self, BoxError> {
        Ok(Self {
            config,
            provisioner: ModelProvisioner::new()?,
        })
    }
}

#[async_trait]
impl ComponentFactory for LocalComponents {
    async fn provision_model(&self) -> Result<(), BoxError> {
        self.provisioner
            .ensure_model_available(
                &self.config.model_path,
                &self.config.model_url,
                self.config.model_min_bytes,
            )
            .await?;
        Ok(())
    }

    async fn load_embedder(&self) -> Result<Arc<dyn Embedder>, BoxError> {
        Ok(Arc::new(CharacterNgramEmbedder::new(
            self.config.embedding_dimensions,
        )))
    }

    async fn open_store(
        &self,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Arc<dyn VectorStore>, BoxError> {
        let store = LocalVectorStore::open(self.config.store_dir.clone(), embedder).await?;
        Ok(Arc::new(store))
    }

    async fn load_model(&self) -> Result<Arc<dyn GenerationModel>, BoxError> {
        let model =
            LlamaServerModel::load(&self.config.model_path, self.config.generation.clone()).await?;
        Ok(Arc::new(model))
    }
}
