use crate::error::{ApiError, QUESTION_REQUIRED};
use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use pdf_rag_core::{has_pdf_extension, IngestError, RagEngine};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

const INDEX_HTML: &str = include_str!("../static/index.html");

pub fn router(engine: Arc<RagEngine>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/query", post(query))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub filename: String,
}

/// Any of the three fields may carry the question. The first non-empty one is
/// picked before trimming, so a whitespace-only `text` shadows `question`.
#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    pub text: Option<String>,
    pub question: Option<String>,
    pub query: Option<String>,
}

impl QueryRequest {
    pub fn question(&self) -> Option<&str> {
        [&self.text, &self.question, &self.query]
            .into_iter()
            .flatten()
            .find(|value| !value.is_empty())
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "application is running",
    })
}

async fn upload(
    State(engine): State<Arc<RagEngine>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() || !has_pdf_extension(Path::new(&filename)) {
            return Err(ApiError::BadRequest("only pdf files are supported.".to_string()));
        }
        let contents = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, contents));
        break;
    }

    let (filename, contents) =
        upload.ok_or_else(|| ApiError::Unprocessable("field required: file".to_string()))?;

    if contents.is_empty() {
        return Err(ApiError::BadRequest("uploaded file is empty.".to_string()));
    }

    let staged = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(".pdf")
        .tempfile()
        .map_err(IngestError::from)?;
    tokio::fs::write(staged.path(), &contents)
        .await
        .map_err(IngestError::from)?;

    let stored = engine.ingest(staged.path(), &filename).await?;
    info!(filename = %filename, chunks = stored, "upload processed");

    Ok(Json(UploadResponse {
        message: "document processed successfully",
        filename,
    }))
}

async fn query(
    State(engine): State<Arc<RagEngine>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(%rejection, "rejected query payload");
        ApiError::Unprocessable(QUESTION_REQUIRED.to_string())
    })?;
    let question = request
        .question()
        .ok_or_else(|| ApiError::Unprocessable(QUESTION_REQUIRED.to_string()))?;

    let reply = engine.answer(question).await?;
    Ok(Json(QueryResponse { reply }))
}

fn multipart_error(error: MultipartError) -> ApiError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(error.body_text())
    } else {
        ApiError::BadRequest(error.body_text())
    }
}
