//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - File routes (presigned URLs, multipart uploads)
//! - Health and liveness probes
//! - Request metrics and the Prometheus scrape endpoint
//! - JSON error responses

pub mod error;
pub mod metrics;
pub mod routes;

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use filegate_core::storage::FileService;

pub use metrics::HttpMetrics;

/// Room for multipart boundaries and text fields on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// File operations service.
    pub files: Arc<FileService>,
    /// HTTP request metrics.
    pub metrics: HttpMetrics,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.files.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .merge(routes::api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use filegate_core::storage::MemoryObjectStore;

    use super::*;

    fn test_app() -> Router {
        create_router(AppState {
            files: Arc::new(FileService::new(Arc::new(MemoryObjectStore::new()), 1024)),
            metrics: HttpMetrics::unregistered().unwrap(),
        })
    }

    #[tokio::test]
    async fn test_request_id_is_returned() {
        let response = test_app()
            .oneshot(Request::builder().uri("/alive").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/alive")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = test_app()
            .oneshot(Request::builder().uri("/files").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
