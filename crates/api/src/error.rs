//! Error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use filegate_core::storage::StorageError;
use filegate_shared::AppError;

/// Error returned by handlers, rendered as `{"error": code, "message": msg}`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    /// Response status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.0.error_code(),
            "message": self.0.message(),
        });
        (self.status(), Json(body)).into_response()
    }
}
