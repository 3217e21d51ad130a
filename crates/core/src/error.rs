use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("document appears to be empty or unreadable.")]
    EmptyDocument,

    #[error("rag engine not initialized")]
    NotReady,

    #[error("vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("extraction task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("rag engine not initialized")]
    NotReady,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding dimension {actual} != {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("collection at {path} was built with {found}, expected {expected}")]
    IncompatibleCollection {
        path: String,
        found: String,
        expected: String,
    },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("model artifact unusable: {0}")]
    ModelArtifact(String),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid model url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to download model. status: {0}")]
    Status(u16),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Initialization stage that failed, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    ProvisionModel,
    LoadEmbedder,
    OpenStore,
    LoadModel,
    AlreadyInitialized,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ProvisionModel => "provisioning model",
            Self::LoadEmbedder => "loading embeddings",
            Self::OpenStore => "connecting to vector store",
            Self::LoadModel => "loading llm",
            Self::AlreadyInitialized => "initializing twice",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Error)]
#[error("error {stage}: {message}")]
pub struct InitError {
    pub stage: InitStage,
    pub message: String,
}

impl InitError {
    pub fn new(stage: InitStage, source: impl fmt::Display) -> Self {
        Self {
            stage,
            message: source.to_string(),
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
