use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, Uri};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use barrage_types::conventions::{HEADER_ENDPOINT, HEADER_TARGET, HEADER_TEST};
use clap::Parser;
use metrics::{describe_counter, describe_histogram, Label, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusRecorder};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const REQUESTS_TOTAL: &str = "squirrel_requests_total";
const REQUEST_DURATION_NANOSECONDS_TOTAL: &str = "squirrel_request_duration_nanoseconds_total";
const REQUEST_DURATION_SECONDS: &str = "squirrel_request_duration_seconds";

const UNKNOWN: &str = "unknown";

#[derive(Debug, Parser, Clone)]
#[command(author, version, about = "HTTP backend answering OK, with per-caller Prometheus metrics")]
struct Args {
    /// Server listen address
    #[arg(long, default_value = "0.0.0.0:7801")]
    listen: String,

    /// Delay before answering each request, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Log every request as a JSON object on stdout
    #[arg(long)]
    log_requests: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

struct AppState {
    recorder: PrometheusRecorder,
    delay: Duration,
    log_requests: bool,
}

impl AppState {
    fn new(delay: Duration, log_requests: bool) -> Result<Self> {
        let recorder = PrometheusBuilder::new()
            .set_quantiles(&[0.5, 0.9, 0.99])
            .context("configure squirrel summaries")?
            .build_recorder();
        metrics::with_local_recorder(&recorder, || {
            describe_counter!(REQUESTS_TOTAL, "Total number of requests answered");
            describe_counter!(
                REQUEST_DURATION_NANOSECONDS_TOTAL,
                Unit::Nanoseconds,
                "Total time squirrel has spent answering requests in nanoseconds"
            );
            describe_histogram!(
                REQUEST_DURATION_SECONDS,
                Unit::Seconds,
                "Time squirrel has spent answering requests in seconds"
            );
        });
        Ok(Self {
            recorder,
            delay,
            log_requests,
        })
    }

    fn record(&self, labels: Vec<Label>, elapsed: Duration) {
        let nanos = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        metrics::with_local_recorder(&self.recorder, || {
            metrics::counter!(REQUESTS_TOTAL, labels.clone()).increment(1);
            metrics::counter!(REQUEST_DURATION_NANOSECONDS_TOTAL, labels.clone())
                .increment(nanos);
            metrics::histogram!(REQUEST_DURATION_SECONDS, labels).record(elapsed.as_secs_f64());
        });
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct RequestLog<'a> {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    header: BTreeMap<String, Vec<String>>,
    method: &'a str,
    path: &'a str,
    time: u128,
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .fallback(handle_request)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_request(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> &'static str {
    let began = Instant::now();
    let received_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_nanos())
        .unwrap_or_default();

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    state.record(request_labels(&method, uri.path(), &headers), began.elapsed());

    if state.log_requests {
        log_request(&method, uri.path(), &headers, received_at);
    }

    "OK"
}

async fn handle_metrics(State(state): State<SharedState>) -> Response {
    let mut response = Response::new(Body::from(state.recorder.handle().render()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

fn request_labels(method: &Method, path: &str, headers: &HeaderMap) -> Vec<Label> {
    let attributed = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string()
    };

    vec![
        Label::new("method", method.as_str().to_lowercase()),
        Label::new("path", path.to_string()),
        Label::new("code", "200"),
        Label::new("endpoint", attributed(HEADER_ENDPOINT)),
        Label::new("target", attributed(HEADER_TARGET)),
        Label::new("test", attributed(HEADER_TEST)),
    ]
}

fn log_request(method: &Method, path: &str, headers: &HeaderMap, time: u128) {
    let mut header: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        header
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    let entry = RequestLog {
        header,
        method: method.as_str(),
        path,
        time,
    };
    match serde_json::to_string(&entry) {
        Ok(line) => println!("{line}"),
        Err(err) => warn!("Failed to encode request log: {}", err),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    if args.listen.trim().is_empty() {
        anyhow::bail!("--listen must not be empty");
    }
    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", args.listen))?;

    let state = Arc::new(AppState::new(
        Duration::from_millis(args.delay_ms),
        args.log_requests,
    )?);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind squirrel listener on {addr}"))?;

    info!("Starting squirrel on {}", addr);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("squirrel server terminated unexpectedly")
}
