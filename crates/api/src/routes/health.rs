//! Health check endpoints.
//!
//! `/alive` only says the process is serving. `/health` also probes the
//! object store and answers 503 when it cannot be reached.

use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::AppState;

/// Upper bound on the storage probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
}

/// Liveness response.
#[derive(Serialize)]
pub struct AliveResponse {
    /// Always `alive`.
    pub status: &'static str,
}

/// Readiness handler, probes the object store.
async fn health_check(State(state): State<AppState>) -> Response {
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let probe = tokio::time::timeout(PROBE_TIMEOUT, state.files.test_connection(&cancel)).await;
    let status = match probe {
        Ok(Ok(())) => {
            return Json(HealthResponse {
                status: "healthy",
                version: env!("CARGO_PKG_VERSION"),
            })
            .into_response();
        }
        Ok(Err(e)) => {
            warn!(kind = e.kind(), error = %e, "Storage probe failed");
            "unhealthy"
        }
        Err(_) => {
            warn!(timeout_secs = PROBE_TIMEOUT.as_secs(), "Storage probe timed out");
            "unhealthy"
        }
    };

    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
        .into_response()
}

/// Liveness handler.
async fn alive() -> Json<AliveResponse> {
    Json(AliveResponse { status: "alive" })
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/alive", get(alive))
}
