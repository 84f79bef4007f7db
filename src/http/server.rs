//! HTTP handler setup shared by both listeners.
//!
//! # Responsibilities
//! - Wrap the application router with the transport middleware
//! - Serve `/health` from the coordinator's lifecycle state
//! - Enforce request timeout and body size limits

use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::HttpConfig;
use crate::lifecycle::CoordinatorState;

/// State injected into the health handler.
#[derive(Clone)]
pub struct HealthState {
    lifecycle: watch::Receiver<CoordinatorState>,
    started: Instant,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub state: &'static str,
    pub uptime_secs: u64,
    pub version: &'static str,
}

/// Build the handler both listeners serve.
///
/// `app` is the business router; this adds `/health` plus the middleware
/// stack (outermost first): request ID, tracing, timeout, body limit,
/// request ID propagation.
pub fn service_router(
    config: &HttpConfig,
    lifecycle: watch::Receiver<CoordinatorState>,
    app: Router,
) -> Router {
    let health = Router::new()
        .route("/health", get(health_handler))
        .with_state(HealthState {
            lifecycle,
            started: Instant::now(),
        });

    app.merge(health).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.request_timeout_secs),
            ))
            .map_response(IntoResponse::into_response)
            .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}

/// Placeholder application used by the binary until a business router is
/// mounted.
pub fn default_app() -> Router {
    Router::new().route("/", get(|| async { env!("CARGO_PKG_NAME") }))
}

async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let current = *state.lifecycle.borrow();
    let (code, status) = match current {
        CoordinatorState::Running => (StatusCode::OK, "ok"),
        CoordinatorState::ShuttingDown | CoordinatorState::Stopped => {
            (StatusCode::SERVICE_UNAVAILABLE, "draining")
        }
    };

    (
        code,
        Json(HealthReport {
            status,
            state: current.as_str(),
            uptime_secs: state.started.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
