//! End-to-end tests against the demo server on a real socket.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use opentelemetry::Value;
use serde_json::{json, Value as Json};
use tokio::net::TcpListener;
use tower::ServiceExt;

use otelaxum::config::TelemetryConfig;
use otelaxum::{HttpServer, RequestTracingLayer, Shutdown};

mod common;

use common::{span_attr, Harness, REMOTE_TRACE_ID, TRACEPARENT};

async fn start_server(harness: &Harness) -> (SocketAddr, Shutdown, tokio::task::JoinHandle<()>) {
    let config = TelemetryConfig::default();
    let layer = RequestTracingLayer::new(
        config.service.name.clone(),
        harness.options().with_filter_config(&config.filters),
    )
    .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, layer);
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    (addr, shutdown, handle)
}

#[tokio::test]
async fn test_user_lookup_is_traced() {
    let harness = Harness::new();
    let (addr, shutdown, handle) = start_server(&harness).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/users/42"))
        .header("traceparent", TRACEPARENT)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    let body: Json = response.json().await.unwrap();
    assert_eq!(body, json!({ "id": 42, "name": "user-42" }));

    let response = client
        .get(format!("http://{addr}/users/0"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    let spans = harness.finished_spans();
    let request_spans: Vec<_> = spans.iter().filter(|s| s.name == "/users/{id}").collect();
    assert_eq!(request_spans.len(), 2);

    let found = request_spans
        .iter()
        .find(|s| s.span_context.trace_id().to_string() == REMOTE_TRACE_ID)
        .unwrap();
    assert_eq!(span_attr(found, "rpc.grpc.status_code"), Some(Value::from(200_i64)));

    // The handler's child span hangs off the request span.
    let lookup = spans
        .iter()
        .find(|s| s.name == "users.lookup" && s.span_context.trace_id().to_string() == REMOTE_TRACE_ID)
        .unwrap();
    assert_eq!(lookup.parent_span_id, found.span_context.span_id());

    let missing = request_spans
        .iter()
        .find(|s| s.span_context.trace_id().to_string() != REMOTE_TRACE_ID)
        .unwrap();
    assert_eq!(
        span_attr(missing, "axum.errors"),
        Some(Value::from("Error #01: user 0 not found\n"))
    );
}

#[tokio::test]
async fn test_health_is_not_traced() {
    let harness = Harness::new();
    let (addr, shutdown, handle) = start_server(&harness).await;

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");

    shutdown.trigger();
    handle.await.unwrap();

    assert!(harness.finished_spans().is_empty());
    assert!(harness.records().is_empty());
}

#[tokio::test]
async fn test_echo_and_failure_routes() {
    let harness = Harness::new();
    let (addr, shutdown, handle) = start_server(&harness).await;
    let client = reqwest::Client::new();

    let payload = json!({ "message": "hello" });
    let echoed: Json = client
        .post(format!("http://{addr}/echo"))
        .json(&payload)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(echoed, payload);

    let response = client.get(format!("http://{addr}/fail")).send().await.unwrap();
    assert_eq!(response.status(), 502);

    shutdown.trigger();
    handle.await.unwrap();

    let spans = harness.finished_spans();
    let fail = spans.iter().find(|s| s.name == "/fail").unwrap();
    assert_eq!(
        span_attr(fail, "axum.errors"),
        Some(Value::from("Error #01: upstream unavailable\n"))
    );
    assert_eq!(harness.records_with_body("request failed").len(), 1);
}

#[tokio::test]
async fn test_skipped_user_lookup_still_served() {
    let harness = Harness::new();
    let mut config = TelemetryConfig::default();
    config.filters.skip_paths = vec!["/users".into()];
    let layer = RequestTracingLayer::new(
        config.service.name.clone(),
        harness.options().with_filter_config(&config.filters),
    )
    .unwrap();
    let router = HttpServer::new(config, layer).router();

    let request = Request::builder().uri("/users/42").body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({ "id": 42, "name": "user-42" }));

    let request = Request::builder().uri("/users/0").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(harness
        .finished_spans()
        .iter()
        .all(|span| span.name != "/users/{id}"));
    assert!(harness.records().is_empty());
}
