//! Crate-level error type.

use thiserror::Error;

use crate::config::loader::ConfigError;

/// Errors raised while provisioning telemetry pipelines or the middleware.
#[derive(Debug, Error)]
pub enum Error {
    /// An exporter endpoint is not a usable URL.
    #[error("invalid exporter endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The log exporter could not be built.
    #[error("failed to build log exporter: {0}")]
    LogExporter(#[source] opentelemetry_otlp::ExporterBuildError),

    /// The span exporter could not be built.
    #[error("failed to build span exporter: {0}")]
    SpanExporter(#[source] opentelemetry_otlp::ExporterBuildError),

    /// The log pipeline was configured without an exporter.
    #[error("logging exporter must be `otlp` or `stdout`")]
    MissingLogExporter,

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
