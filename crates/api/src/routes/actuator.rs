//! Operational endpoints: health, Prometheus metrics and configuration refresh.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use menu::RefreshEvent;
use metrics_exporter_prometheus::PrometheusHandle;
use points::PointsSink;
use serde::Serialize;
use store::OrderStore;

use super::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /metrics: Prometheus text exposition.
pub async fn prometheus(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}

/// POST /actuator/refresh: asks the coordinator to reload `cart.coffees`.
///
/// The refresh runs asynchronously; 202 only means it was queued.
#[tracing::instrument(skip(state))]
pub async fn refresh<S: OrderStore + 'static, P: PointsSink + 'static>(
    State(state): State<Arc<AppState<S, P>>>,
) -> Result<StatusCode, ApiError> {
    state
        .refresh
        .trigger(RefreshEvent::ConfigRefreshed)
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    metrics::counter!("cart_refresh_requests_total", "trigger" => "http").increment(1);
    tracing::info!("configuration refresh requested");
    Ok(StatusCode::ACCEPTED)
}
