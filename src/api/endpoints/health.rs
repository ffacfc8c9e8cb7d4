//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store_reachable: bool,
    pub version: &'static str,
}

/// `GET /health`: liveness plus a record store probe.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let core = ctx.core.clone();
    let store_reachable = tokio::task::spawn_blocking(move || core.open_db().is_ok())
        .await
        .unwrap_or(false);

    Json(HealthResponse {
        status: "ok",
        store_reachable,
        version: crate::config::APP_VERSION,
    })
}
