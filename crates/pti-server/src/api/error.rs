use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use crate::db::DbError;
use crate::storage::StorageError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Everything an API handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid content type: {0:?}")]
    InvalidContentType(String),

    #[error("No `file` field in upload")]
    MissingFile,

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Image not found")]
    NotFound,

    #[error("Image file missing from disk")]
    FileMissing,

    #[error("Persistence failure: {0}")]
    Persistence(#[from] DbError),

    #[error("Filesystem failure: {0}")]
    Filesystem(#[from] StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, detail) = match &self {
            ApiError::InvalidContentType(ct) => (
                StatusCode::BAD_REQUEST,
                "Invalid file type",
                Some(format!("content type {ct:?} is not accepted")),
            ),
            ApiError::MissingFile => (
                StatusCode::BAD_REQUEST,
                "Missing file",
                Some("expected a multipart field named `file`".to_string()),
            ),
            ApiError::Multipart(e) => (e.status(), "Invalid multipart body", Some(e.body_text())),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Image not found", None),
            ApiError::FileMissing => (StatusCode::NOT_FOUND, "File missing", None),
            ApiError::Persistence(e) => {
                error!(%e, "Persistence failure");
                let detail = match e {
                    DbError::DuplicateHexcode(_) => Some(e.to_string()),
                    _ => None,
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Persistence failure",
                    detail,
                )
            }
            ApiError::Filesystem(e) => {
                error!(%e, "Filesystem failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Filesystem failure",
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            detail,
        };

        (status, Json(body)).into_response()
    }
}
