//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use opentelemetry::logs::{AnyValue, Severity};
use opentelemetry::Value;
use opentelemetry_sdk::logs::{InMemoryLogExporter, SdkLogRecord, SdkLoggerProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};

use otelaxum::TraceOptions;

pub const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";
pub const REMOTE_TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
pub const REMOTE_SPAN_ID: &str = "00f067aa0ba902b7";

/// In-memory span and log pipelines with simple (synchronous) processors,
/// so everything a request produces is visible once it completes.
pub struct Harness {
    pub spans: InMemorySpanExporter,
    pub logs: InMemoryLogExporter,
    pub tracer_provider: SdkTracerProvider,
    pub logger_provider: SdkLoggerProvider,
}

impl Harness {
    pub fn new() -> Self {
        let spans = InMemorySpanExporter::default();
        let logs = InMemoryLogExporter::default();
        let tracer_provider = SdkTracerProvider::builder()
            .with_simple_exporter(spans.clone())
            .build();
        let logger_provider = SdkLoggerProvider::builder()
            .with_simple_exporter(logs.clone())
            .build();
        Self {
            spans,
            logs,
            tracer_provider,
            logger_provider,
        }
    }

    /// Options wired to this harness, with an explicit W3C propagator.
    pub fn options(&self) -> TraceOptions {
        TraceOptions::new()
            .with_tracer_provider(self.tracer_provider.clone())
            .with_logger_provider(self.logger_provider.clone())
            .with_propagator(TraceContextPropagator::new())
    }

    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.spans.get_finished_spans().unwrap()
    }

    pub fn records(&self) -> Vec<SdkLogRecord> {
        self.logs
            .get_emitted_logs()
            .unwrap()
            .into_iter()
            .map(|log| log.record)
            .collect()
    }

    /// Records whose body equals `body`.
    pub fn records_with_body(&self, body: &'static str) -> Vec<SdkLogRecord> {
        let body = AnyValue::from(body);
        self.records()
            .into_iter()
            .filter(|record| record.body() == Some(&body))
            .collect()
    }
}

pub fn span_attr(span: &SpanData, key: &str) -> Option<Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}

pub fn record_attr(record: &SdkLogRecord, key: &str) -> Option<AnyValue> {
    record
        .attributes_iter()
        .find(|(k, _)| k.as_str() == key)
        .map(|(_, v)| v.clone())
}

pub fn severity(record: &SdkLogRecord) -> Option<Severity> {
    record.severity_number()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
