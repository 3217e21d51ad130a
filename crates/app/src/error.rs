use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdf_rag_core::{IngestError, QueryError};
use serde::Serialize;
use thiserror::Error;

pub const QUESTION_REQUIRED: &str = "please provide a question.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Internal(String),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::EmptyDocument
            | IngestError::InvalidArgument(_)
            | IngestError::InvalidChunkConfig(_) => Self::BadRequest(err.to_string()),
            IngestError::NotReady => Self::Internal(err.to_string()),
            other => {
                tracing::error!(error = %other, "unexpected error processing file");
                Self::Internal(format!("error processing file: {other}"))
            }
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidInput(message) => Self::Unprocessable(message),
            QueryError::NotReady => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::Unprocessable(detail) => (StatusCode::UNPROCESSABLE_ENTITY, detail),
            Self::PayloadTooLarge(detail) => (StatusCode::PAYLOAD_TOO_LARGE, detail),
            Self::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    detail: String,
}
