//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! TelemetryConfig
//!     → tracing.rs (span exporter + batch processor + sampler, propagation)
//!     → logging.rs (log exporter + batch processor, request logger)
//!
//! Consumers:
//!     → http::middleware (spans and correlated log records per request)
//!     → main (console subscriber, provider shutdown at exit)
//! ```
//!
//! # Design Decisions
//! - Providers are passed in explicitly; process-wide defaults are only read
//!   as a fallback and only written by the binary
//! - Pipelines are shut down when the process exits, never earlier
//! - Console logging stays on `tracing`; exported logs go through the
//!   OpenTelemetry logs SDK

pub mod attributes;
pub mod logging;
pub mod tracing;

pub use self::logging::{Correlation, LogPipeline, RequestLogger};
pub use self::tracing::{Propagator, Telemetry, TracePipeline};

/// Instrumentation scope name for spans and log records produced here.
pub const SCOPE_NAME: &str = "otelaxum";

/// Instrumentation scope version.
pub const SCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) fn instrumentation_scope() -> opentelemetry::InstrumentationScope {
    opentelemetry::InstrumentationScope::builder(SCOPE_NAME)
        .with_version(SCOPE_VERSION)
        .build()
}

pub(crate) fn service_resource(service: &str) -> opentelemetry_sdk::Resource {
    opentelemetry_sdk::Resource::builder()
        .with_service_name(service.to_string())
        .build()
}

/// Checked, owned copy of a configured exporter endpoint.
pub(crate) fn exporter_endpoint(endpoint: &str) -> crate::error::Result<String> {
    crate::config::validation::parse_endpoint(endpoint).map_err(|reason| {
        crate::error::Error::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        }
    })?;
    Ok(endpoint.to_string())
}
