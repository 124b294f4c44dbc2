//! HTTP error type for fitmatch-tp

use crate::store::StoreError;
use crate::types::ResolutionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Identifier did not resolve, or resolved ambiguously
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Store rejected or could not take a write
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Resolution(ResolutionError::InvalidFormat(_)) => StatusCode::BAD_REQUEST,
            ApiError::Resolution(ResolutionError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Resolution(ResolutionError::AmbiguousMatch { .. }) => StatusCode::CONFLICT,
            ApiError::Resolution(ResolutionError::BackingStoreUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Store(StoreError::SaveConflict(_)) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Resolution(e) => e.code(),
            ApiError::Store(StoreError::SaveConflict(_)) => "SAVE_CONFLICT",
            ApiError::Store(StoreError::Unavailable(_)) => "BACKING_STORE_UNAVAILABLE",
            ApiError::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
        });

        if let ApiError::Resolution(ResolutionError::AmbiguousMatch { candidates, .. }) = &self {
            error["candidates"] = json!(candidates);
        }

        (status, Json(json!({ "success": false, "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
