//! Prometheus scrape endpoint.

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::TEXT_FORMAT;
use tracing::error;

use crate::AppState;

async fn render(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => ([(CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Creates the metrics route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(render))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use filegate_core::storage::{FileService, MemoryObjectStore};

    use super::*;
    use crate::metrics::HttpMetrics;
    use crate::routes::files::UPLOAD_ROUTE;

    #[tokio::test]
    async fn test_metrics_are_scrapeable() {
        let metrics = HttpMetrics::unregistered().unwrap();
        metrics.start_timer(UPLOAD_ROUTE).finish(StatusCode::OK);
        let state = AppState {
            files: Arc::new(FileService::new(Arc::new(MemoryObjectStore::new()), 1024)),
            metrics,
        };

        let response = Router::new()
            .merge(routes())
            .with_state(state)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], TEXT_FORMAT);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(r#"filegate_http_requests_total{route="/files/upload",status="200"} 1"#));
    }
}
