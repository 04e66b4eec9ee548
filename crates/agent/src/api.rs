//! HTTP API for health checks and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use sysusage::{ComponentStatus, HealthRegistry, SysusageMetrics};
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: SysusageMetrics,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, metrics: SysusageMetrics) -> Self {
        Self {
            health_registry,
            metrics,
        }
    }
}

/// 200 while every metric is operational, 503 once one is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus text exposition
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

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

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use sysusage::{ComponentHealth, Severity, UNHEALTHY_AFTER_FAILURES};
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(HealthRegistry::new(), SysusageMetrics::new()))
    }

    async fn get_request(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_healthz_healthy() {
        let state = test_state();
        state.health_registry.register("cpu").await;

        let (status, body) = get_request(create_router(state), "/healthz").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["components"]["cpu"]["consecutive_failures"], 0);
    }

    #[tokio::test]
    async fn test_healthz_degraded_is_still_ok() {
        let state = test_state();
        state.health_registry.register("disk").await;
        state
            .health_registry
            .record_failure("disk", "failed to read /sys/block/sda/stat")
            .await;

        let (status, body) = get_request(create_router(state), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"degraded\""));
    }

    #[tokio::test]
    async fn test_healthz_unhealthy() {
        let state = test_state();
        state
            .health_registry
            .update("memory", ComponentHealth::failing(UNHEALTHY_AFTER_FAILURES, "gone"))
            .await;

        let (status, _) = get_request(create_router(state), "/healthz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_readyz_not_ready() {
        let (status, body) = get_request(create_router(test_state()), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("not yet initialized"));
    }

    #[tokio::test]
    async fn test_readyz_ready() {
        let state = test_state();
        state.health_registry.set_ready(true).await;

        let (status, body) = get_request(create_router(state), "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"ready":true}"#);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let state = test_state();
        state.metrics.set_value("api-test", 42.0, Severity::Warning);

        let (status, body) = get_request(create_router(state), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("sysusage_metric_value{metric=\"api-test\"} 42"));
        assert!(body.contains("sysusage_metric_severity{metric=\"api-test\"} 2"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _) = get_request(create_router(test_state()), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
