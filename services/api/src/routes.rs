use crate::infra::{AppState, RunReport};
use address_recon::error::AppError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use serde_json::json;

pub(crate) fn router() -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/reconciliation/runs",
            axum::routing::post(start_run_endpoint),
        )
        .route(
            "/api/v1/reconciliation/runs/latest",
            axum::routing::get(latest_run_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Runs one batch to completion; a second request while it runs gets 409.
pub(crate) async fn start_run_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<Json<RunReport>, AppError> {
    let report = state.runs.execute().await?;
    Ok(Json(report))
}

pub(crate) async fn latest_run_endpoint(Extension(state): Extension<AppState>) -> Response {
    match state.runs.latest() {
        Some(report) => Json(report).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "no reconciliation run yet" })),
        )
            .into_response(),
    }
}
