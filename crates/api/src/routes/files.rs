//! File routes: presigned download URLs and multipart uploads.
//!
//! Both handlers time themselves with a [`RequestTimer`](crate::metrics::RequestTimer)
//! from the first line, so malformed requests are counted too.

use axum::{
    Json, Router,
    extract::{
        Multipart, Query, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::QueryRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use filegate_core::storage::{StorageError, UploadRequest};
use filegate_shared::AppError;

use crate::{AppState, error::ApiError};

/// Route for presigned download URLs.
pub const PRESIGNED_URL_ROUTE: &str = "/files/presigned-url";
/// Route for multipart uploads.
pub const UPLOAD_ROUTE: &str = "/files/upload";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const UPLOAD_SUCCEEDED: &str = "File uploaded successfully.";
const UPLOAD_FAILED: &str = "File upload failed.";

/// Creates the file routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(PRESIGNED_URL_ROUTE, get(presigned_url))
        .route(UPLOAD_ROUTE, post(upload))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for a presigned URL.
///
/// Missing parameters become empty strings and are rejected by the service.
#[derive(Debug, Default, Deserialize)]
pub struct PresignedUrlQuery {
    /// Bucket name.
    #[serde(default)]
    pub bucket: String,
    /// Object key.
    #[serde(default)]
    pub object: String,
}

/// Presigned URL response.
#[derive(Debug, Serialize)]
pub struct PresignedUrlResponse {
    /// URL granting GET access to the object.
    pub url: String,
    /// When the URL expires (ISO 8601).
    pub expires_at: String,
}

/// Upload response.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Human readable outcome.
    pub message: &'static str,
}

/// Multipart fields collected from an upload request.
#[derive(Debug, Default)]
struct UploadForm {
    bucket: Option<String>,
    object: Option<String>,
    size: Option<u64>,
    file_name: Option<String>,
    content_type: Option<String>,
    content: Option<Bytes>,
}

impl UploadForm {
    /// Turn the form into an upload request.
    ///
    /// The object key falls back to the file name of the `file` part. The
    /// declared size falls back to the received length.
    fn into_request(self) -> Result<UploadRequest, ApiError> {
        let content = self
            .content
            .ok_or_else(|| AppError::Validation("file field is required".to_string()))?;
        let size = self.size.or(Some(content.len() as u64));

        Ok(UploadRequest {
            bucket_name: self.bucket.unwrap_or_default(),
            object_name: self.object.or(self.file_name).unwrap_or_default(),
            content_type: self
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            content,
            size,
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Generate a presigned GET URL valid for one hour.
async fn presigned_url(
    State(state): State<AppState>,
    query: Result<Query<PresignedUrlQuery>, QueryRejection>,
) -> Response {
    let timer = state.metrics.start_timer(PRESIGNED_URL_ROUTE);

    let response = match query {
        Ok(Query(query)) => {
            match state
                .files
                .generate_presigned_url(&query.bucket, &query.object)
                .await
            {
                Ok(presigned) => {
                    info!(
                        bucket = %query.bucket,
                        object = %query.object,
                        "Presigned URL generated"
                    );
                    Json(PresignedUrlResponse {
                        url: presigned.url,
                        expires_at: presigned.expires_at.to_rfc3339(),
                    })
                    .into_response()
                }
                Err(e) => {
                    log_failure(PRESIGNED_URL_ROUTE, &e);
                    ApiError::from(e).into_response()
                }
            }
        }
        Err(rejection) => {
            warn!(error = %rejection, "Invalid presigned URL query");
            ApiError::from(AppError::Validation(rejection.body_text())).into_response()
        }
    };

    timer.finish(response.status());
    response
}

/// Upload a file from a multipart form.
///
/// Fields: `file` (required), `bucket` (required), `object` and `size`
/// (optional).
async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let timer = state.metrics.start_timer(UPLOAD_ROUTE);

    // Abandons the backend call if the client disconnects
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let request = read_upload_form(multipart)
        .await
        .and_then(UploadForm::into_request);

    let response = match request {
        Ok(request) => {
            let bucket = request.bucket_name.clone();
            let object = request.object_name.clone();

            match state.files.upload_object(request, &cancel).await {
                Ok(()) => {
                    info!(bucket = %bucket, object = %object, "File uploaded");
                    Json(UploadResponse {
                        message: UPLOAD_SUCCEEDED,
                    })
                    .into_response()
                }
                Err(e @ StorageError::BackendRejected { .. }) => {
                    log_failure(UPLOAD_ROUTE, &e);
                    ApiError(AppError::BadRequest(UPLOAD_FAILED.to_string())).into_response()
                }
                Err(e) => {
                    log_failure(UPLOAD_ROUTE, &e);
                    ApiError::from(e).into_response()
                }
            }
        }
        Err(e) => {
            warn!(error = %e.0, "Invalid upload form");
            e.into_response()
        }
    };

    timer.finish(response.status());
    response
}

// ============================================================================
// Helper Functions
// ============================================================================

async fn read_upload_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadForm, ApiError> {
    let mut multipart =
        multipart.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                form.file_name = field.file_name().map(str::to_string);
                form.content_type = field.content_type().map(str::to_string);
                form.content = Some(field.bytes().await.map_err(multipart_error)?);
            }
            "bucket" => form.bucket = Some(field.text().await.map_err(multipart_error)?),
            "object" => form.object = Some(field.text().await.map_err(multipart_error)?),
            "size" => {
                let text = field.text().await.map_err(multipart_error)?;
                let size = text.trim().parse::<u64>().map_err(|_| {
                    AppError::Validation("size must be a non-negative integer".to_string())
                })?;
                form.size = Some(size);
            }
            // Unknown fields are skipped
            _ => {}
        }
    }

    Ok(form)
}

fn multipart_error(err: MultipartError) -> ApiError {
    let message = err.body_text();
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError(AppError::PayloadTooLarge(message))
    } else {
        ApiError(AppError::Validation(message))
    }
}

fn log_failure(route: &str, err: &StorageError) {
    match err {
        StorageError::InputInvalid(_) => warn!(route, kind = err.kind(), error = %err, "Rejected request"),
        _ => error!(route, kind = err.kind(), error = %err, "File operation failed"),
    }
}
