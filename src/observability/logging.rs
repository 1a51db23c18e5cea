//! Structured logging.
//!
//! # Responsibilities
//! - Build the log export pipeline (exporter + batching processor)
//! - Emit request log records correlated with the active span
//! - Initialize the console subscriber for the binary
//!
//! # Design Decisions
//! - Request records go straight to the OpenTelemetry logs SDK so the
//!   pipeline can be injected per middleware instance
//! - Console output uses `tracing` with an env-configurable filter

use std::time::SystemTime;

use opentelemetry::logs::{AnyValue, LogRecord as _, Logger as _, LoggerProvider as _, Severity};
use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId};
use opentelemetry::Key;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::logs::{SdkLogger, SdkLoggerProvider};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use super::attributes::{LOG_SPAN_ID, LOG_TRACE_ID};
use super::{exporter_endpoint, instrumentation_scope, service_resource};
use crate::config::{ExporterKind, LoggingConfig};
use crate::error::{Error, Result};

/// Builder for the log export pipeline.
pub struct LogPipeline;

impl LogPipeline {
    /// Build a logger provider that batches records into the configured
    /// exporter.
    ///
    /// The caller owns the provider and must shut it down when the process
    /// exits so buffered records are flushed.
    pub fn build(service: &str, config: &LoggingConfig) -> Result<SdkLoggerProvider> {
        let builder = SdkLoggerProvider::builder().with_resource(service_resource(service));

        let provider = match config.exporter {
            ExporterKind::Otlp => {
                let mut exporter = opentelemetry_otlp::LogExporter::builder().with_http();
                if let Some(endpoint) = &config.endpoint {
                    exporter = exporter.with_endpoint(exporter_endpoint(endpoint)?);
                }
                let exporter = exporter.build().map_err(Error::LogExporter)?;
                builder.with_batch_exporter(exporter).build()
            }
            ExporterKind::OtlpGrpc => {
                let mut exporter = opentelemetry_otlp::LogExporter::builder().with_tonic();
                if let Some(endpoint) = &config.endpoint {
                    exporter = exporter.with_endpoint(exporter_endpoint(endpoint)?);
                }
                let exporter = exporter.build().map_err(Error::LogExporter)?;
                builder.with_batch_exporter(exporter).build()
            }
            ExporterKind::Stdout => builder
                .with_batch_exporter(opentelemetry_stdout::LogExporter::default())
                .build(),
            ExporterKind::None => return Err(Error::MissingLogExporter),
        };

        tracing::debug!(
            service = %service,
            exporter = ?config.exporter,
            endpoint = ?config.endpoint,
            "Log pipeline initialized"
        );
        Ok(provider)
    }
}

/// Trace and span identifiers attached to every request log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correlation {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub trace_flags: TraceFlags,
}

impl From<&SpanContext> for Correlation {
    fn from(cx: &SpanContext) -> Self {
        Self {
            trace_id: cx.trace_id(),
            span_id: cx.span_id(),
            trace_flags: cx.trace_flags(),
        }
    }
}

/// Emits request log records through an OpenTelemetry logger.
pub struct RequestLogger {
    logger: SdkLogger,
}

impl RequestLogger {
    pub fn new(provider: &SdkLoggerProvider) -> Self {
        Self {
            logger: provider.logger_with_scope(instrumentation_scope()),
        }
    }

    /// Emit one record carrying `correlation` both as the record's trace
    /// context and as `trace_id`/`span_id` attributes.
    pub fn emit<I>(&self, severity: Severity, body: &'static str, correlation: &Correlation, attributes: I)
    where
        I: IntoIterator<Item = (Key, AnyValue)>,
    {
        let mut record = self.logger.create_log_record();
        let now = SystemTime::now();
        record.set_timestamp(now);
        record.set_observed_timestamp(now);
        record.set_severity_number(severity);
        record.set_severity_text(severity_text(severity));
        record.set_body(AnyValue::from(body));
        record.set_trace_context(
            correlation.trace_id,
            correlation.span_id,
            Some(correlation.trace_flags),
        );
        record.add_attribute(LOG_TRACE_ID, correlation.trace_id.to_string());
        record.add_attribute(LOG_SPAN_ID, correlation.span_id.to_string());
        record.add_attributes(attributes);
        self.logger.emit(record);
    }
}

fn severity_text(severity: Severity) -> &'static str {
    match severity {
        Severity::Trace | Severity::Trace2 | Severity::Trace3 | Severity::Trace4 => "TRACE",
        Severity::Debug | Severity::Debug2 | Severity::Debug3 | Severity::Debug4 => "DEBUG",
        Severity::Info | Severity::Info2 | Severity::Info3 | Severity::Info4 => "INFO",
        Severity::Warn | Severity::Warn2 | Severity::Warn3 | Severity::Warn4 => "WARN",
        Severity::Error | Severity::Error2 | Severity::Error3 | Severity::Error4 => "ERROR",
        _ => "FATAL",
    }
}

/// Install the console subscriber. `RUST_LOG` wins over `level`.
pub fn init_subscriber(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("otelaxum={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_endpoint_is_fatal() {
        let config = LoggingConfig {
            exporter: ExporterKind::Otlp,
            endpoint: Some("not a url".into()),
            ..LoggingConfig::default()
        };
        let err = LogPipeline::build("svc", &config).unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_none_exporter_is_rejected() {
        let config = LoggingConfig {
            exporter: ExporterKind::None,
            ..LoggingConfig::default()
        };
        assert!(matches!(
            LogPipeline::build("svc", &config),
            Err(Error::MissingLogExporter)
        ));
    }

    #[test]
    fn test_stdout_pipeline_builds() {
        let config = LoggingConfig {
            exporter: ExporterKind::Stdout,
            ..LoggingConfig::default()
        };
        let provider = LogPipeline::build("svc", &config).unwrap();
        assert!(provider.shutdown().is_ok());
    }

    #[test]
    fn test_invalid_grpc_endpoint_is_fatal() {
        let config = LoggingConfig {
            exporter: ExporterKind::OtlpGrpc,
            endpoint: Some("collector:4317".into()),
            ..LoggingConfig::default()
        };
        let err = LogPipeline::build("svc", &config).unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
    }

    // The gRPC channel is created lazily on the runtime.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_grpc_pipeline_builds() {
        let config = LoggingConfig {
            exporter: ExporterKind::OtlpGrpc,
            endpoint: Some("http://localhost:4317".into()),
            ..LoggingConfig::default()
        };
        let provider = LogPipeline::build("svc", &config).unwrap();
        assert!(provider.shutdown().is_ok());
    }

    #[test]
    fn test_severity_text() {
        assert_eq!(severity_text(Severity::Debug), "DEBUG");
        assert_eq!(severity_text(Severity::Info), "INFO");
        assert_eq!(severity_text(Severity::Error), "ERROR");
    }
}
