//! Health and metrics endpoints.
//!
//! - `GET /health` - Liveness probe (is the process running?)
//! - `GET /ready` - Readiness probe (is the controller `Joined`?)
//! - `GET /metrics` - Prometheus text format, when a recorder handle is given

use axum::{extract::State, http::StatusCode, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Liveness and readiness flags.
#[derive(Debug)]
pub struct HealthState {
    /// Always true after startup.
    live: AtomicBool,
    /// True while the media session is joined.
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (live=true, ready=false).
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct RouterState {
    health: Arc<HealthState>,
    metrics: Option<PrometheusHandle>,
}

/// Create the router serving `/health`, `/ready` and `/metrics`.
pub fn health_router(health: Arc<HealthState>, metrics: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(RouterState { health, metrics })
}

async fn liveness_handler(State(state): State<RouterState>) -> StatusCode {
    if state.health.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn readiness_handler(State(state): State<RouterState>) -> StatusCode {
    if state.health.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics_handler(State(state): State<RouterState>) -> (StatusCode, String) {
    match state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    async fn status_of(app: Router, uri: &str) -> StatusCode {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");
        app.oneshot(request)
            .await
            .expect("Failed to execute request")
            .status()
    }

    #[test]
    fn test_health_state_transitions() {
        let state = HealthState::new();
        assert!(state.is_live());
        assert!(!state.is_ready());

        state.set_ready();
        assert!(state.is_ready());

        state.set_not_ready();
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn test_liveness_endpoint() {
        let app = health_router(Arc::new(HealthState::new()), None);
        assert_eq!(status_of(app, "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_follows_state() {
        let state = Arc::new(HealthState::new());

        let app = health_router(Arc::clone(&state), None);
        assert_eq!(
            status_of(app, "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.set_ready();
        let app = health_router(Arc::clone(&state), None);
        assert_eq!(status_of(app, "/ready").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder_is_not_found() {
        let app = health_router(Arc::new(HealthState::new()), None);
        assert_eq!(status_of(app, "/metrics").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_renders_prometheus_text() {
        use http_body_util::BodyExt;
        use metrics_exporter_prometheus::PrometheusBuilder;

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            crate::observability::metrics::record_teardown_fault("camera");
        });

        let app = health_router(Arc::new(HealthState::new()), Some(handle));
        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .expect("Failed to build request");
        let response = app.oneshot(request).await.expect("Failed to execute request");
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("session_teardown_faults_total"));
    }

    #[tokio::test]
    async fn test_unknown_path_returns_404() {
        let app = health_router(Arc::new(HealthState::new()), None);
        assert_eq!(status_of(app, "/unknown").await, StatusCode::NOT_FOUND);
    }
}
