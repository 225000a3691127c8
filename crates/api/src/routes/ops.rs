//! Health and Prometheus metrics endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::state::{AppState, Backend};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub inventory_responder: bool,
    pub compensation_listener: bool,
}

/// GET /health — returns process health and background loop status.
pub async fn health<K: Backend>(State(state): State<Arc<AppState<K>>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        inventory_responder: state.responder_running().await,
        compensation_listener: state.orchestrator.listener_running().await,
    })
}

/// GET /metrics — returns Prometheus-formatted metrics.
pub async fn metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
