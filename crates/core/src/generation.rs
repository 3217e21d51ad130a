use crate::error::GenerationError;
use crate::models::GenerationOptions;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

const GGUF_MAGIC: &[u8; 4] = b"GGUF";

#[async_trait]
pub trait GenerationModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Context window in tokens, used to budget the prompt.
    fn context_length(&self) -> usize;

    /// Tokens reserved for the completion inside the context window.
    fn max_new_tokens(&self) -> usize;
}

/// Completion client for a llama.cpp-compatible server running the local GGUF model.
pub struct LlamaServerModel {
    client: Client,
    endpoint: String,
    options: GenerationOptions,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

impl LlamaServerModel {
    pub async fn load(model_path: &Path, options: GenerationOptions) -> Result<Self, GenerationError> {
        verify_model_artifact(model_path).await?;

        let client = Client::builder().timeout(options.request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: options.endpoint.trim_end_matches('/').to_string(),
            options,
        })
    }
}

#[async_trait]
impl GenerationModel for LlamaServerModel {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/completion", self.endpoint);
        debug!(%url, prompt_chars = prompt.len(), "requesting completion");

        let response = self
            .client
            .post(&url)
            .json(&CompletionRequest {
                prompt,
                n_predict: self.options.max_new_tokens,
                temperature: self.options.temperature,
                stream: false,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(GenerationError::BackendResponse {
                backend: url,
                details: format!("{status}: {body}"),
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        Ok(parsed.content)
    }

    fn context_length(&self) -> usize {
        self.options.context_length
    }

    fn max_new_tokens(&self) -> usize {
        self.options.max_new_tokens
    }
}

/// Checks that `path` is a readable GGUF file.
pub async fn verify_model_artifact(path: &Path) -> Result<(), GenerationError> {
    let mut file = tokio::fs::File::open(path).await.map_err(|error| {
        GenerationError::ModelArtifact(format!("{}: {error}", path.display()))
    })?;

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic).await.map_err(|error| {
        GenerationError::ModelArtifact(format!("{}: {error}", path.display()))
    })?;

    if &magic != GGUF_MAGIC {
        return Err(GenerationError::ModelArtifact(format!(
            "{} is not a gguf file",
            path.display()
        )));
    }

    Ok(())
}
