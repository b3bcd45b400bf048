//! Attack cycles against an in-process HTTP server.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use barrage_attack::{AttackTarget, AttackerConfig, HttpAttacker, TrafficGenerator};
use barrage_types::{Endpoint, TRANSPORT_ERROR_CODE};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct Seen {
    tests: Arc<Mutex<Vec<String>>>,
}

async fn ok(State(seen): State<Seen>, headers: HeaderMap) -> &'static str {
    if let Some(value) = headers.get("x-barrage-test").and_then(|v| v.to_str().ok()) {
        seen.tests.lock().await.push(value.to_string());
    }
    "OK"
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn spawn_server(seen: Seen) -> SocketAddr {
    let app = Router::new()
        .route("/", get(ok))
        .route("/fail", get(unavailable))
        .with_state(seen);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn target(url: String, test: &str) -> AttackTarget {
    let mut headers = BTreeMap::new();
    headers.insert("X-Barrage-Test".to_string(), test.to_string());
    AttackTarget::new(&Endpoint::new(url), &headers).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cycle_issues_rate_times_duration_requests() {
    let seen = Seen::default();
    let addr = spawn_server(seen.clone()).await;
    let attacker = HttpAttacker::new(AttackerConfig::default()).unwrap();

    let started = Instant::now();
    let outcomes = attacker
        .attack(
            &target(format!("http://{addr}/"), "smoke"),
            50,
            Duration::from_millis(200),
        )
        .await;

    assert_eq!(outcomes.len(), 10);
    assert!(outcomes.iter().all(|o| o.status_code == 200));
    // The tenth request is paced to ~180ms after the first.
    assert!(started.elapsed() >= Duration::from_millis(150));

    let tests = seen.tests.lock().await;
    assert_eq!(tests.len(), 10);
    assert!(tests.iter().all(|t| t == "smoke"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn error_statuses_are_outcomes() {
    let addr = spawn_server(Seen::default()).await;
    let attacker = HttpAttacker::new(AttackerConfig::default()).unwrap();

    let outcomes = attacker
        .attack(
            &target(format!("http://{addr}/fail"), "smoke"),
            20,
            Duration::from_millis(100),
        )
        .await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.status_code == 503));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refused_connections_become_transport_errors() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let attacker = HttpAttacker::new(AttackerConfig {
        connect_timeout: Duration::from_millis(500),
        request_timeout: Duration::from_secs(1),
        ..AttackerConfig::default()
    })
    .unwrap();

    let outcomes = attacker
        .attack(
            &target(format!("http://{addr}/"), "smoke"),
            20,
            Duration::from_millis(100),
        )
        .await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|o| o.status_code == TRANSPORT_ERROR_CODE));
}

#[tokio::test]
async fn empty_cycle_still_waits_for_its_duration() {
    let attacker = HttpAttacker::new(AttackerConfig::default()).unwrap();
    let started = Instant::now();
    let outcomes = attacker
        .attack(
            &target("http://127.0.0.1:9/".to_string(), "idle"),
            1,
            Duration::from_millis(100),
        )
        .await;

    assert!(outcomes.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sub_nanosecond_pacing_does_not_panic() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let attacker = HttpAttacker::new(AttackerConfig::default()).unwrap();
    let outcomes = attacker
        .attack(
            &target(format!("http://{addr}/"), "flood"),
            10_000_000_000,
            Duration::from_nanos(1),
        )
        .await;

    assert_eq!(outcomes.len(), 10);
    assert!(outcomes
        .iter()
        .all(|o| o.status_code == TRANSPORT_ERROR_CODE));
}
