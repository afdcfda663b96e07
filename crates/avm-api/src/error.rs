//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use avm_store::StoreError;
use avm_worker::WorkerError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn video_not_found() -> Self {
        Self::not_found("Video not found")
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<WorkerError> for ApiError {
    fn from(e: WorkerError) -> Self {
        match e {
            WorkerError::Validation(msg) => ApiError::Validation(msg),
            WorkerError::NotFound(_) => ApiError::video_not_found(),
            WorkerError::NotReady(_) => ApiError::bad_request("Video not ready"),
            WorkerError::Store(StoreError::NotFound(_)) => ApiError::video_not_found(),
            WorkerError::Store(e) if e.is_state_error() => ApiError::Conflict(e.to_string()),
            other => ApiError::internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

/// Set on responses built from [`ApiError::Internal`] so the production
/// router can strip their detail.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InternalErrorDetail;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let code = match &self {
            ApiError::Validation(_) => Some("validation_error".to_string()),
            ApiError::RateLimited => Some("rate_limited".to_string()),
            _ => None,
        };

        let internal = matches!(self, ApiError::Internal(_));
        let mut response = (
            status,
            Json(ErrorResponse {
                detail: self.to_string(),
                code,
            }),
        )
            .into_response();
        if internal {
            response.extensions_mut().insert(InternalErrorDetail);
        }
        response
    }
}
