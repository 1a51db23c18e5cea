//! Configuration schema definitions.
//!
//! This module defines the configuration structure for the demo server and
//! the telemetry pipelines the middleware provisions.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service identity reported on spans and resources.
    pub service: ServiceConfig,

    /// Listener configuration for the demo server.
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Span export settings.
    pub tracing: TracingConfig,

    /// Log export and console settings.
    pub logging: LoggingConfig,

    /// Requests excluded from tracing.
    pub filters: FilterConfig,
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name (`service.name`, `rpc.service`).
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "otelaxum".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Where a telemetry pipeline sends its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExporterKind {
    /// OTLP over HTTP/protobuf.
    Otlp,
    /// OTLP over gRPC.
    #[serde(rename = "otlp_grpc")]
    OtlpGrpc,
    /// Human-readable output on stdout.
    Stdout,
    /// Export nothing.
    None,
}

/// Span export configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    pub exporter: ExporterKind,

    /// OTLP traces endpoint. Uses the exporter default when unset.
    pub endpoint: Option<String>,

    /// Fraction of root traces sampled, in `[0, 1]`.
    /// Children follow their parent's decision.
    pub sample_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            exporter: ExporterKind::Otlp,
            endpoint: None,
            sample_ratio: 1.0,
        }
    }
}

/// Log export and console configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console log level (trace, debug, info, warn, error) used when
    /// `RUST_LOG` is unset.
    pub level: String,

    /// Log record exporter. `none` is rejected: the middleware requires a
    /// log pipeline.
    pub exporter: ExporterKind,

    /// OTLP logs endpoint. Uses the exporter default when unset.
    pub endpoint: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            exporter: ExporterKind::Otlp,
            endpoint: None,
        }
    }
}

/// Requests excluded from tracing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Path prefixes that are never traced.
    pub skip_paths: Vec<String>,

    /// HTTP methods that are never traced.
    pub skip_methods: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            skip_paths: vec!["/health".to_string()],
            skip_methods: Vec::new(),
        }
    }
}
