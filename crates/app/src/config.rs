use clap::Args;
use pdf_rag_core::models::{
    DEFAULT_LLM_ENDPOINT, DEFAULT_MODEL_PATH, DEFAULT_MODEL_URL, DEFAULT_STORE_DIR,
    MIN_MODEL_BYTES,
};
use pdf_rag_core::{EngineConfig, GenerationOptions, IngestionOptions, DEFAULT_EMBEDDING_DIMENSIONS};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// Address the HTTP server binds to (host:port).
    #[arg(long, env = "PDF_RAG_BIND", default_value = "127.0.0.1:8000")]
    pub bind: String,

    /// Local path of the GGUF model file.
    #[arg(long, env = "PDF_RAG_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    /// Where to download the model from when it is missing.
    #[arg(long, env = "PDF_RAG_MODEL_URL", default_value = DEFAULT_MODEL_URL)]
    pub model_url: String,

    /// Files smaller than this are treated as corrupt and downloaded again.
    #[arg(long, env = "PDF_RAG_MODEL_MIN_BYTES", default_value_t = MIN_MODEL_BYTES)]
    pub model_min_bytes: u64,

    /// Directory holding the persistent vector collection.
    #[arg(long, env = "PDF_RAG_STORE_DIR", default_value = DEFAULT_STORE_DIR)]
    pub store_dir: PathBuf,

    /// Base URL of the llama.cpp-compatible completion server.
    #[arg(long, env = "PDF_RAG_LLM_ENDPOINT", default_value = DEFAULT_LLM_ENDPOINT)]
    pub llm_endpoint: String,

    /// Seconds before a completion request is abandoned.
    #[arg(long, env = "PDF_RAG_LLM_TIMEOUT_SECS", default_value_t = 300)]
    pub llm_timeout_secs: u64,

    /// Maximum chunk length in characters.
    #[arg(long, default_value_t = 700)]
    pub chunk_size: usize,

    /// Characters shared between neighbouring chunks.
    #[arg(long, default_value_t = 80)]
    pub chunk_overlap: usize,

    /// Chunks retrieved per question.
    #[arg(long, default_value_t = 3)]
    pub top_k: usize,

    #[arg(long, default_value_t = 256)]
    pub max_new_tokens: usize,

    #[arg(long, default_value_t = 0.5)]
    pub temperature: f32,

    /// Model context window in tokens.
    #[arg(long, default_value_t = 2048)]
    pub context_length: usize,

    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    pub embedding_dimensions: usize,
}

impl AppConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            model_path: self.model_path.clone(),
            model_url: self.model_url.clone(),
            model_min_bytes: self.model_min_bytes,
            store_dir: self.store_dir.clone(),
            embedding_dimensions: self.embedding_dimensions.max(1),
            top_k: self.top_k.max(1),
            ingestion: IngestionOptions {
                chunk_max_chars: self.chunk_size,
                chunk_overlap_chars: self.chunk_overlap,
            },
            generation: GenerationOptions {
                endpoint: self.llm_endpoint.clone(),
                max_new_tokens: self.max_new_tokens,
                temperature: self.temperature,
                context_length: self.context_length,
                request_timeout: Duration::from_secs(self.llm_timeout_secs.max(1)),
            },
        }
    }
}
