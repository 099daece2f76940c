//! HTTP API for health checks and Prometheus metrics
//!
//! Only process health and Prometheus output are served here. Stored node and
//! pod usage is read through `store_lib::MetricsGetter` by the serving layer
//! that embeds the store, so this router never touches the snapshot.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::TextEncoder;
use std::sync::Arc;
use store_lib::health::{ComponentStatus, HealthRegistry};
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry) -> Self {
        Self { health_registry }
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once a batch is stored, 503 before
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Render every registered metric in the Prometheus text format
pub fn render_metrics() -> prometheus::Result<String> {
    TextEncoder::new().encode_to_string(&prometheus::gather())
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    match render_metrics() {
        Ok(body) => (StatusCode::OK, [("content-type", TEXT_CONTENT_TYPE)], body),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", TEXT_CONTENT_TYPE)],
                String::new(),
            )
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
