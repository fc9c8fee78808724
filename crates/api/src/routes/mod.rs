//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod files;
pub mod health;
pub mod metrics;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(metrics::routes())
        .merge(files::routes())
}
