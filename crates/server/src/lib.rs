//! Barrage scrape server
//!
//! Serves the live registry of a running load test:
//!
//! - `GET /metrics`: Prometheus text exposition;
//! - `GET /health`: JSON liveness payload.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use barrage_registry::RegistryReader;
use barrage_types::HealthStatus;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Everything the handlers need; cheap to share.
pub struct ServerState {
    reader: RegistryReader,
    test_name: String,
    layer_count: usize,
    endpoint_count: usize,
    start_time: Instant,
    scrapes: AtomicU64,
}

impl ServerState {
    pub fn new(
        reader: RegistryReader,
        test_name: impl Into<String>,
        layer_count: usize,
        endpoint_count: usize,
    ) -> Self {
        Self {
            reader,
            test_name: test_name.into(),
            layer_count,
            endpoint_count,
            start_time: Instant::now(),
            scrapes: AtomicU64::new(0),
        }
    }

    fn record_scrape(&self) -> u64 {
        self.scrapes.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

type SharedState = Arc<ServerState>;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

/// Binds `addr` and serves until `shutdown` is cancelled.
pub async fn start_server(
    state: ServerState,
    addr: &str,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = bind_listener(addr).await?;
    serve(state, listener, shutdown).await
}

/// Serves on an already bound listener until `shutdown` is cancelled.
pub async fn serve(
    state: ServerState,
    listener: tokio::net::TcpListener,
    shutdown: CancellationToken,
) -> Result<()> {
    if let Ok(local) = listener.local_addr() {
        info!("Metrics server listening on {}", local);
    }
    let app = build_router(Arc::new(state));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("metrics server terminated unexpectedly")
}

pub async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind metrics listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind metrics listener on {addr}"))
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_metrics(State(state): State<SharedState>) -> Response {
    state.record_scrape();
    let mut response = Response::new(Body::from(state.reader.render()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(METRICS_CONTENT_TYPE),
    );
    response
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthStatus> {
    let mut health = HealthStatus::healthy(state.test_name.clone());
    health.layer_count = state.layer_count as u64;
    health.endpoint_count = state.endpoint_count as u64;
    health.uptime_seconds = state.uptime_seconds();
    health.scrapes_served = state.scrapes.load(Ordering::Relaxed);
    health.version = env!("CARGO_PKG_VERSION").to_string();
    Json(health)
}

async fn handle_not_found() -> ApiError {
    ApiError::not_found("not found")
}
