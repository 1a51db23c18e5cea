//! The middleware falls back to the process-wide tracer provider and
//! propagator. Kept in its own test binary since it writes the globals.

use axum::body::Body;
use axum::http::Request;
use axum::routing::get;
use axum::Router;
use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tower::ServiceExt;

use otelaxum::{RequestTracingLayer, TraceOptions};

mod common;

use common::{Harness, REMOTE_SPAN_ID, REMOTE_TRACE_ID, TRACEPARENT};

#[tokio::test]
async fn test_global_provider_and_propagator_are_used() {
    let harness = Harness::new();
    global::set_tracer_provider(harness.tracer_provider.clone());
    global::set_text_map_propagator(TraceContextPropagator::new());

    let layer = RequestTracingLayer::new(
        "orders",
        TraceOptions::new().with_logger_provider(harness.logger_provider.clone()),
    )
    .unwrap();
    let app = Router::new()
        .route("/orders/{id}", get(|| async { "ok" }))
        .layer(layer);

    let request = Request::builder()
        .uri("/orders/9")
        .header("traceparent", TRACEPARENT)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap();

    let spans = harness.finished_spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "/orders/{id}");
    assert_eq!(spans[0].span_context.trace_id().to_string(), REMOTE_TRACE_ID);
    assert_eq!(spans[0].parent_span_id.to_string(), REMOTE_SPAN_ID);
    assert_eq!(harness.records_with_body("request completed").len(), 1);
}
