//! Distributed tracing support.
//!
//! # Responsibilities
//! - Extract trace context from incoming requests
//! - Inject trace context into outgoing requests
//! - Build the span export pipeline and install process-wide defaults
//!
//! # Design Decisions
//! - W3C Trace Context is the default propagation format
//! - Parent-based sampling so remote decisions are honoured
//! - Global provider/propagator are written once, by the binary

use std::fmt;
use std::sync::Arc;

use axum::http::HeaderMap;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::{global, Context};
use opentelemetry_http::{HeaderExtractor, HeaderInjector};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};

use super::{exporter_endpoint, service_resource};
use crate::config::{ExporterKind, TracingConfig};
use crate::error::{Error, Result};

/// Codec used to move trace context in and out of HTTP headers.
#[derive(Clone, Default)]
pub enum Propagator {
    /// Read the process-wide propagator on every use.
    #[default]
    Global,
    Custom(Arc<dyn TextMapPropagator + Send + Sync>),
}

impl Propagator {
    pub fn new<P>(propagator: P) -> Self
    where
        P: TextMapPropagator + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(propagator))
    }

    /// Extract a remote parent from `headers`, relative to the current
    /// context.
    pub fn extract(&self, headers: &HeaderMap) -> Context {
        let extractor = HeaderExtractor(headers);
        match self {
            Self::Global => global::get_text_map_propagator(|propagator| {
                propagator.extract_with_context(&Context::current(), &extractor)
            }),
            Self::Custom(propagator) => {
                propagator.extract_with_context(&Context::current(), &extractor)
            }
        }
    }

    /// Write `cx` into `headers` for a downstream call.
    pub fn inject(&self, cx: &Context, headers: &mut HeaderMap) {
        let mut injector = HeaderInjector(headers);
        match self {
            Self::Global => global::get_text_map_propagator(|propagator| {
                propagator.inject_context(cx, &mut injector)
            }),
            Self::Custom(propagator) => propagator.inject_context(cx, &mut injector),
        }
    }
}

impl fmt::Debug for Propagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("Propagator::Global"),
            Self::Custom(_) => f.write_str("Propagator::Custom"),
        }
    }
}

/// Builder for the span export pipeline.
pub struct TracePipeline;

impl TracePipeline {
    /// Build a tracer provider for `config`, or `None` when spans are not
    /// exported.
    pub fn build(service: &str, config: &TracingConfig) -> Result<Option<SdkTracerProvider>> {
        let sampler = Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            config.sample_ratio,
        )));
        let builder = SdkTracerProvider::builder()
            .with_resource(service_resource(service))
            .with_sampler(sampler);

        let provider = match config.exporter {
            ExporterKind::Otlp => {
                let mut exporter = opentelemetry_otlp::SpanExporter::builder().with_http();
                if let Some(endpoint) = &config.endpoint {
                    exporter = exporter.with_endpoint(exporter_endpoint(endpoint)?);
                }
                let exporter = exporter.build().map_err(Error::SpanExporter)?;
                builder.with_batch_exporter(exporter).build()
            }
            ExporterKind::OtlpGrpc => {
                let mut exporter = opentelemetry_otlp::SpanExporter::builder().with_tonic();
                if let Some(endpoint) = &config.endpoint {
                    exporter = exporter.with_endpoint(exporter_endpoint(endpoint)?);
                }
                let exporter = exporter.build().map_err(Error::SpanExporter)?;
                builder.with_batch_exporter(exporter).build()
            }
            ExporterKind::Stdout => builder
                .with_batch_exporter(opentelemetry_stdout::SpanExporter::default())
                .build(),
            ExporterKind::None => return Ok(None),
        };

        ::tracing::debug!(
            service = %service,
            exporter = ?config.exporter,
            sample_ratio = config.sample_ratio,
            "Trace pipeline initialized"
        );
        Ok(Some(provider))
    }
}

/// Process-wide telemetry owned by the binary.
///
/// Dropping this without calling [`Telemetry::shutdown`] loses buffered
/// spans and log records.
#[must_use = "telemetry must be shut down at process exit"]
pub struct Telemetry {
    tracer: Option<SdkTracerProvider>,
    loggers: Vec<SdkLoggerProvider>,
}

impl Telemetry {
    /// Build the span pipeline and install it, together with the W3C
    /// propagator, as the process-wide defaults.
    pub fn install(service: &str, config: &TracingConfig) -> Result<Self> {
        let tracer = TracePipeline::build(service, config)?;
        if let Some(provider) = &tracer {
            global::set_tracer_provider(provider.clone());
        }
        global::set_text_map_propagator(TraceContextPropagator::new());

        Ok(Self {
            tracer,
            loggers: Vec::new(),
        })
    }

    /// Shut `provider` down together with the rest of the telemetry.
    pub fn track_logger(&mut self, provider: SdkLoggerProvider) {
        self.loggers.push(provider);
    }

    /// Flush and shut down every provider.
    pub fn shutdown(self) {
        if let Some(provider) = self.tracer {
            if let Err(err) = provider.shutdown() {
                ::tracing::warn!(error = %err, "Tracer provider shutdown failed");
            }
        }
        for provider in self.loggers {
            if let Err(err) = provider.shutdown() {
                ::tracing::warn!(error = %err, "Logger provider shutdown failed");
            }
        }
        ::tracing::info!("Telemetry shut down");
    }
}
