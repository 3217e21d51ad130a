use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL_URL: &str = "https://huggingface.co/TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF/resolve/main/tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf";
pub const DEFAULT_MODEL_PATH: &str = "models/tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf";
pub const DEFAULT_STORE_DIR: &str = "data/vector_store";
pub const DEFAULT_LLM_ENDPOINT: &str = "http://127.0.0.1:8080";
pub const MIN_MODEL_BYTES: u64 = 100 * 1024 * 1024;

/// A bounded span of document text; the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_index: u64,
    /// 1-based page number, `None` for chunks cut from fallback text.
    pub page: Option<u32>,
    /// Byte offset of `text` inside the text it was split from.
    pub offset: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub document_id: String,
    pub source: String,
    pub page: Option<u32>,
    pub chunk_index: u64,
    pub text: String,
    pub embedding: Vec<f32>,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub source: String,
    pub page: Option<u32>,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 700,
            chunk_overlap_chars: 80,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub endpoint: String,
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub context_length: usize,
    pub request_timeout: Duration,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            max_new_tokens: 256,
            temperature: 0.5,
            context_length: 2048,
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// Everything the engine needs to bring its three subsystems up.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model_path: PathBuf,
    pub model_url: String,
    pub model_min_bytes: u64,
    pub store_dir: PathBuf,
    pub embedding_dimensions: usize,
    pub top_k: usize,
    pub ingestion: IngestionOptions,
    pub generation: GenerationOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            model_url: DEFAULT_MODEL_URL.to_string(),
            model_min_bytes: MIN_MODEL_BYTES,
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            embedding_dimensions: crate::embeddings::DEFAULT_EMBEDDING_DIMENSIONS,
            top_k: 3,
            ingestion: IngestionOptions::default(),
            generation: GenerationOptions::default(),
        }
    }
}
