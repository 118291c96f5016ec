//! API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use attache_files::FileError;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    NotFound { resource: &'static str, id: String },
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn not_found(resource: &'static str, id: impl std::fmt::Display) -> Self {
        ApiError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FileError> for ApiError {
    fn from(e: FileError) -> Self {
        match e {
            FileError::NotFound(path) => ApiError::not_found("File", path),
            FileError::Unstored => ApiError::not_found("File", "unstored"),
            FileError::UnknownDisk(disk) => {
                ApiError::internal(format!("unknown disk: {}", disk))
            }
            FileError::Storage(e) => ApiError::internal(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::NotFound { resource, id } => ErrorBody {
                error: "not_found",
                message: format!("{} {} not found", resource, id),
            },
            ApiError::BadRequest(msg) => ErrorBody {
                error: "bad_request",
                message: msg.clone(),
            },
            ApiError::Conflict(msg) => ErrorBody {
                error: "conflict",
                message: msg.clone(),
            },
            ApiError::Internal(msg) => ErrorBody {
                error: "internal_error",
                message: msg.clone(),
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
