//! `/health` and `/metrics` endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::ServerContext;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the endpoint answers.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Occupied session slots.
    pub active_sessions: usize,
    /// Total session slots.
    pub capacity: usize,
    /// Live tracked units (listener, health endpoint, workers).
    pub units: usize,
    /// Whether the shutdown signal is set.
    pub shutting_down: bool,
}

/// Build a health response from the live context.
pub fn health_check(ctx: &ServerContext) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: ctx.started_at.elapsed().as_secs(),
        active_sessions: ctx.registry.active_count(),
        capacity: ctx.registry.capacity(),
        units: ctx.shutdown.units().len(),
        shutting_down: ctx.shutdown.is_shutting_down(),
    }
}

/// Router serving `/health` and `/metrics`.
pub fn router(ctx: Arc<ServerContext>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(ctx)
}

/// Serve the router on `listener` until `stop` is cancelled.
pub async fn serve(listener: TcpListener, ctx: Arc<ServerContext>, stop: CancellationToken) {
    let addr = listener.local_addr().ok();
    info!(?addr, "health endpoint listening");
    let result = axum::serve(listener, router(ctx))
        .with_graceful_shutdown(stop.cancelled_owned())
        .await;
    if let Err(e) = result {
        warn!(error = %e, "health endpoint failed");
    }
    info!("health endpoint stopped");
}

/// GET /health
async fn health_handler(State(ctx): State<Arc<ServerContext>>) -> Json<HealthResponse> {
    Json(health_check(&ctx))
}

/// GET /metrics
async fn metrics_handler(State(ctx): State<Arc<ServerContext>>) -> String {
    ctx.metrics
        .as_ref()
        .map(metrics_exporter_prometheus::PrometheusHandle::render)
        .unwrap_or_default()
}
