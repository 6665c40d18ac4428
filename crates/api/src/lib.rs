//! HTTP front end of the coffee cart service.
//!
//! Serves the menu and order endpoints, with structured logging (tracing),
//! Prometheus metrics and an actuator-style refresh trigger.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use points::{OutboundPipeline, PointsSink};
use resilience::{CircuitBreaker, RateLimiter, ResilienceError, RetryPolicy};
use store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Name shared by the points circuit breaker and rate limiter in logs and metrics.
pub const POINTS_SINK: &str = "points-sink";

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, P>(state: Arc<AppState<S, P>>, metrics_handle: PrometheusHandle) -> Router
where
    S: OrderStore + 'static,
    P: PointsSink + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::actuator::prometheus))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::actuator::health))
        .route("/cart/coffees", get(routes::coffees::list::<S, P>))
        .route("/cart/orders", post(routes::orders::place::<S, P>))
        .route("/actuator/refresh", post(routes::actuator::refresh::<S, P>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wraps `sink` in the resilience stages enabled by `config`.
///
/// The circuit breaker and rate limiter are created once here and shared by
/// every delivery for the lifetime of the process.
pub fn build_pipeline<P: PointsSink>(
    sink: P,
    config: &Config,
) -> Result<OutboundPipeline<P>, ResilienceError> {
    let mut pipeline = OutboundPipeline::new(sink);

    if config.circuit_breaker_enabled {
        let breaker = CircuitBreaker::new(POINTS_SINK, config.circuit_breaker.clone())?;
        pipeline = pipeline.with_circuit_breaker(Arc::new(breaker));
    }
    if config.rate_limiter_enabled {
        let limiter = RateLimiter::new(POINTS_SINK, config.rate_limiter.clone())?;
        pipeline = pipeline.with_rate_limiter(Arc::new(limiter));
    }
    pipeline = pipeline.with_retry(if config.retry_enabled {
        config.retry.clone()
    } else {
        RetryPolicy::single_attempt()
    });

    tracing::info!(
        circuit_breaker = config.circuit_breaker_enabled,
        rate_limiter = config.rate_limiter_enabled,
        retry_attempts = if config.retry_enabled { config.retry.max_attempts } else { 1 },
        "points pipeline configured"
    );
    Ok(pipeline)
}
