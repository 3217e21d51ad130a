use crate::error::DownloadError;
use reqwest::Client;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    AlreadyPresent { bytes: u64 },
    Downloaded { bytes: u64 },
}

/// Fetches a model artifact to local disk once, never leaving a partial file at the final path.
#[derive(Debug, Clone)]
pub struct ModelProvisioner {
    client: Client,
}

impl ModelProvisioner {
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(DEFAULT_TIMEOUT, DEFAULT_TIMEOUT)
    }

    pub fn with_timeouts(connect: Duration, read: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(connect)
            .read_timeout(read)
            .build()?;
        Ok(Self { client })
    }

    pub async fn ensure_model_available(
        &self,
        path: &Path,
        url: &str,
        min_valid_size: u64,
    ) -> Result<ProvisionOutcome, DownloadError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        if let Ok(metadata) = tokio::fs::metadata(path).await {
            let size = metadata.len();
            if size >= min_valid_size {
                info!(path = %path.display(), bytes = size, "model found locally");
                return Ok(ProvisionOutcome::AlreadyPresent { bytes: size });
            }

            warn!(
                path = %path.display(),
                bytes = size,
                min_valid_size,
                "model file found but too small, redownloading"
            );
            tokio::fs::remove_file(path).await?;
        }

        let url = Url::parse(url)?;
        let staging = staging_path(path);
        info!(%url, path = %path.display(), "model not found locally, downloading");

        let result = async {
            let bytes = self.download_to(&url, &staging).await?;
            tokio::fs::rename(&staging, path).await?;
            Ok::<_, DownloadError>(bytes)
        }
        .await;

        match result {
            Ok(bytes) => {
                if bytes < min_valid_size {
                    warn!(bytes, min_valid_size, "downloaded model is smaller than expected");
                }
                info!(path = %path.display(), bytes, "model downloaded successfully");
                Ok(ProvisionOutcome::Downloaded { bytes })
            }
            Err(error) => {
                warn!(%error, "error downloading model");
                if tokio::fs::try_exists(&staging).await.unwrap_or(false) {
                    if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                        warn!(path = %staging.display(), error = %cleanup, "could not remove partial download");
                    }
                }
                Err(error)
            }
        }
    }

    async fn download_to(&self, url: &Url, staging: &Path) -> Result<u64, DownloadError> {
        let mut response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status().as_u16()));
        }

        let mut file = tokio::fs::File::create(staging).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(written)
    }
}

/// Convenience wrapper using the default 60s connect/read timeouts.
pub async fn ensure_model_available(
    path: &Path,
    url: &str,
    min_valid_size: u64,
) -> Result<ProvisionOutcome, DownloadError> {
    ModelProvisioner::new()?
        .ensure_model_available(path, url, min_valid_size)
        .await
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    const PAYLOAD_LEN: usize = 4096;

    async fn spawn(router: Router) -> Result<String, Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        Ok(format!("http://{address}"))
    }

    async fn model_server(hits: Arc<AtomicUsize>) -> Result<String, Box<dyn std::error::Error>> {
        let router = Router::new().route(
            "/model.gguf",
            get(move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    vec![7u8; PAYLOAD_LEN]
                }
            }),
        );
        Ok(format!("{}/model.gguf", spawn(router).await?))
    }

    #[tokio::test]
    async fn downloads_missing_model_into_new_directory() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("models").join("model.gguf");
        let hits = Arc::new(AtomicUsize::new(0));
        let url = model_server(hits.clone()).await?;

        let outcome = ModelProvisioner::new()?
            .ensure_model_available(&path, &url, 1024)
            .await?;

        assert_eq!(outcome, ProvisionOutcome::Downloaded { bytes: PAYLOAD_LEN as u64 });
        assert_eq!(std::fs::metadata(&path)?.len(), PAYLOAD_LEN as u64);
        assert!(!staging_path(&path).exists());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn keeps_valid_model_without_network() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("model.gguf");
        std::fs::write(&path, vec![1u8; 2048])?;

        let outcome = ModelProvisioner::new()?
            .ensure_model_available(&path, "http://127.0.0.1:9/unreachable", 1024)
            .await?;

        assert_eq!(outcome, ProvisionOutcome::AlreadyPresent { bytes: 2048 });
        Ok(())
    }

    #[tokio::test]
    async fn undersized_model_is_replaced() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("model.gguf");
        std::fs::write(&path, b"truncated")?;
        let hits = Arc::new(AtomicUsize::new(0));
        let url = model_server(hits.clone()).await?;

        let outcome = ModelProvisioner::new()?
            .ensure_model_available(&path, &url, 1024)
            .await?;

        assert!(matches!(outcome, ProvisionOutcome::Downloaded { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let mut contents = Vec::new();
        tokio::fs::File::open(&path)
            .await?
            .read_to_end(&mut contents)
            .await?;
        assert_eq!(contents, vec![7u8; PAYLOAD_LEN]);
        Ok(())
    }

    #[tokio::test]
    async fn failed_status_leaves_no_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("model.gguf");
        let router = Router::new().route("/model.gguf", get(|| async { StatusCode::NOT_FOUND }));
        let url = format!("{}/model.gguf", spawn(router).await?);

        let result = ModelProvisioner::new()?
            .ensure_model_available(&path, &url, 1024)
            .await;

        assert!(matches!(result, Err(DownloadError::Status(404))));
        assert!(!path.exists());
        assert!(!staging_path(&path).exists());
        Ok(())
    }

    #[tokio::test]
    async fn interrupted_transfer_removes_partial_file() -> Result<(), Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100000\r\n\r\npartial-bytes")
                    .await;
                let _ = socket.shutdown().await;
            }
        });

        let dir = tempdir()?;
        let path = dir.path().join("model.gguf");
        let result = ModelProvisioner::new()?
            .ensure_model_available(&path, &format!("http://{address}/model.gguf"), 1024)
            .await;

        assert!(matches!(result, Err(DownloadError::Http(_))));
        assert!(!path.exists());
        assert!(!staging_path(&path).exists());
        Ok(())
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = ensure_model_available(&dir.path().join("m.gguf"), "not a url", 1).await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl(_))));
        Ok(())
    }
}
