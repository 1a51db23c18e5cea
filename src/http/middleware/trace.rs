//! Span-per-request tracing middleware.
//!
//! Every request that passes the configured filters gets one server span,
//! named after its route template and parented on the trace context found in
//! its headers, plus three correlated log records: `request received`
//! (debug), `request failed` (error, only when handlers recorded errors) and
//! `request completed` (info).
//!
//! ```text
//! request ─▶ filters ──(rejected)──────────────────────────────▶ inner
//!               │
//!               ▼
//!           extract context ─▶ start span ─▶ debug log
//!               ─▶ inner (span context attached) ─▶ status / errors
//!               ─▶ error log? ─▶ info log ─▶ span ended (drop guard)
//! ```
//!
//! The span is ended and the previous current context restored by drop
//! guards, so a panicking or cancelled handler never leaks either.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, Request, Response};
use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::logs::{AnyValue, Severity};
use opentelemetry::trace::{SpanKind, TraceContextExt, Tracer, TracerProvider};
use opentelemetry::{Context, Key, KeyValue};
use opentelemetry_sdk::logs::SdkLoggerProvider;
use tower::{Layer, Service};

use crate::config::{FilterConfig, LoggingConfig};
use crate::error::Result;
use crate::http::errors::{HandlerError, HandlerErrors};
use crate::http::middleware::filter::{filters_from_config, Filter, RouteFilter};
use crate::http::request::RequestInfo;
use crate::observability::attributes::*;
use crate::observability::{instrumentation_scope, Correlation, LogPipeline, Propagator, RequestLogger};

const LOG_TARGET: &str = "otelaxum::http";

/// Options resolved once when the layer is built.
///
/// Anything left unset falls back to a process-wide default: the tracer
/// comes from [`opentelemetry::global::tracer_provider`], the propagator from
/// [`opentelemetry::global::get_text_map_propagator`]. Those are the only
/// global reads the middleware performs. Without a logger provider, one is
/// built from the [`LoggingConfig`].
pub struct TraceOptions {
    tracer: Option<BoxedTracer>,
    propagator: Propagator,
    filters: Vec<Arc<dyn Filter>>,
    route_filters: Vec<Arc<dyn RouteFilter>>,
    logger_provider: Option<SdkLoggerProvider>,
    logging: LoggingConfig,
}

impl TraceOptions {
    pub fn new() -> Self {
        Self {
            tracer: None,
            propagator: Propagator::Global,
            filters: Vec::new(),
            route_filters: Vec::new(),
            logger_provider: None,
            logging: LoggingConfig::default(),
        }
    }

    /// Source spans from `provider` instead of the global provider.
    pub fn with_tracer_provider<P>(mut self, provider: P) -> Self
    where
        P: TracerProvider,
        P::Tracer: Send + Sync + 'static,
        <P::Tracer as Tracer>::Span: Send + Sync + 'static,
    {
        let tracer = provider.tracer_with_scope(instrumentation_scope());
        self.tracer = Some(BoxedTracer::new(Box::new(tracer)));
        self
    }

    /// Extract inbound context with `propagator` instead of the global one.
    pub fn with_propagator<P>(mut self, propagator: P) -> Self
    where
        P: opentelemetry::propagation::TextMapPropagator + Send + Sync + 'static,
    {
        self.propagator = Propagator::new(propagator);
        self
    }

    /// Append a filter over the request head.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Filter + 'static,
    {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Append the filters described by `config`.
    pub fn with_filter_config(mut self, config: &FilterConfig) -> Self {
        self.filters.extend(filters_from_config(config));
        self
    }

    /// Append a filter over the router-resolved request view. Route filters
    /// run after all head filters.
    pub fn with_route_filter<F>(mut self, filter: F) -> Self
    where
        F: RouteFilter + 'static,
    {
        self.route_filters.push(Arc::new(filter));
        self
    }

    /// Emit request logs through `provider` instead of building a pipeline.
    pub fn with_logger_provider(mut self, provider: SdkLoggerProvider) -> Self {
        self.logger_provider = Some(provider);
        self
    }

    /// Pipeline settings used when no logger provider is supplied.
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = config;
        self
    }
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TraceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceOptions")
            .field("tracer", &self.tracer.as_ref().map(|_| "custom"))
            .field("propagator", &self.propagator)
            .field("filters", &self.filters.len())
            .field("route_filters", &self.route_filters.len())
            .field("logger_provider", &self.logger_provider.is_some())
            .field("logging", &self.logging)
            .finish()
    }
}

/// Tracer used by the middleware, available to handlers as a request
/// extension for starting child spans.
#[derive(Clone)]
pub struct RequestTracer(Arc<BoxedTracer>);

impl Deref for RequestTracer {
    type Target = BoxedTracer;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for RequestTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestTracer")
    }
}

/// Yields the middleware's tracer, or one from the global provider when the
/// request is not traced.
impl<S> FromRequestParts<S> for RequestTracer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<RequestTracer>().cloned().unwrap_or_else(|| {
            RequestTracer(Arc::new(
                global::tracer_provider().tracer_with_scope(instrumentation_scope()),
            ))
        }))
    }
}

struct Shared {
    service: String,
    tracer: Arc<BoxedTracer>,
    propagator: Propagator,
    filters: Vec<Arc<dyn Filter>>,
    route_filters: Vec<Arc<dyn RouteFilter>>,
    logger: RequestLogger,
    logger_provider: SdkLoggerProvider,
}

impl Shared {
    fn should_trace(&self, parts: &Parts) -> bool {
        if !self.filters.iter().all(|filter| filter.allows(parts)) {
            return false;
        }
        if self.route_filters.is_empty() {
            return true;
        }
        let info = RequestInfo::new(parts);
        self.route_filters.iter().all(|filter| filter.allows(&info))
    }

    fn span_attributes(&self, info: &RequestInfo<'_>) -> Vec<KeyValue> {
        vec![
            KeyValue::new(SERVICE_NAME, self.service.clone()),
            KeyValue::new(RPC_SYSTEM, RPC_SYSTEM_VALUE),
            KeyValue::new(RPC_SERVICE, self.service.clone()),
            KeyValue::new(RPC_METHOD, info.method().as_str().to_string()),
            KeyValue::new(NET_PEER_NAME, info.host().to_string()),
        ]
    }

    fn finish<B, E>(&self, request: &TracedRequest, result: &Result<Response<B>, E>)
    where
        E: fmt::Display,
    {
        let span = request.guard.cx.span();
        let correlation = &request.correlation;

        let status = match result {
            Ok(response) => response.status().as_u16(),
            Err(_) => 0,
        };
        if status > 0 {
            span.set_attribute(KeyValue::new(RPC_GRPC_STATUS_CODE, i64::from(status)));
        }

        match result {
            Ok(response) => {
                if let Some(err) = response.extensions().get::<HandlerError>() {
                    request.errors.extend([err.clone()]);
                }
            }
            Err(err) => request.errors.push(err),
        }

        if !request.errors.is_empty() {
            let summary = request.errors.to_string();
            span.set_attribute(KeyValue::new(HANDLER_ERRORS, summary.clone()));
            self.logger.emit(
                Severity::Error,
                "request failed",
                correlation,
                [(Key::from_static_str(LOG_ERRORS), AnyValue::from(summary.clone()))],
            );
            tracing::error!(
                target: LOG_TARGET,
                trace_id = %correlation.trace_id,
                span_id = %correlation.span_id,
                errors = %summary.trim_end(),
                "request failed"
            );
        }

        self.logger.emit(
            Severity::Info,
            "request completed",
            correlation,
            [
                (Key::from_static_str(LOG_METHOD), AnyValue::from(request.method.clone())),
                (Key::from_static_str(LOG_ROUTE), AnyValue::from(request.route.clone())),
                (Key::from_static_str(LOG_STATUS), AnyValue::from(i64::from(status))),
            ],
        );
        tracing::info!(
            target: LOG_TARGET,
            trace_id = %correlation.trace_id,
            span_id = %correlation.span_id,
            method = %request.method,
            route = %request.route,
            status,
            "request completed"
        );
    }
}

/// Ends the request span when dropped, whatever way the request exits.
struct SpanGuard {
    cx: Context,
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.cx.span().end();
    }
}

/// Per-request state carried from `call` into the response future.
struct TracedRequest {
    guard: SpanGuard,
    correlation: Correlation,
    method: String,
    route: String,
    errors: HandlerErrors,
}

/// Layer that wraps services in [`RequestTracing`].
///
/// Apply it with `Router::layer` (not around the whole router) so the matched
/// route template is available for span names.
///
/// A request whose future is dropped before completing, for example by a
/// timeout layered outside this one, still has its span ended but gets no
/// status attribute and no `request completed` log. Layer timeouts inside
/// this layer to have them recorded.
#[derive(Clone)]
pub struct RequestTracingLayer {
    shared: Arc<Shared>,
}

impl RequestTracingLayer {
    /// Resolve `options` for `service`.
    ///
    /// Fails when the log pipeline cannot be built: a middleware whose logs go
    /// nowhere is not created.
    pub fn new(service: impl Into<String>, options: TraceOptions) -> Result<Self> {
        let service = service.into();
        let TraceOptions {
            tracer,
            propagator,
            filters,
            route_filters,
            logger_provider,
            logging,
        } = options;

        let tracer = tracer
            .unwrap_or_else(|| global::tracer_provider().tracer_with_scope(instrumentation_scope()));
        let logger_provider = match logger_provider {
            Some(provider) => provider,
            None => LogPipeline::build(&service, &logging)?,
        };
        let logger = RequestLogger::new(&logger_provider);

        tracing::debug!(
            service = %service,
            propagator = ?propagator,
            filters = filters.len(),
            route_filters = route_filters.len(),
            "Request tracing layer constructed"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                service,
                tracer: Arc::new(tracer),
                propagator,
                filters,
                route_filters,
                logger,
                logger_provider,
            }),
        })
    }

    pub fn service(&self) -> &str {
        &self.shared.service
    }

    /// Provider the request logs are emitted through. Shut it down at
    /// process exit to flush buffered records.
    pub fn logger_provider(&self) -> &SdkLoggerProvider {
        &self.shared.logger_provider
    }
}

impl<S> Layer<S> for RequestTracingLayer {
    type Service = RequestTracing<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTracing {
            inner,
            shared: self.shared.clone(),
        }
    }
}

/// Service produced by [`RequestTracingLayer`].
#[derive(Clone)]
pub struct RequestTracing<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestTracing<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: fmt::Display + Send + 'static,
    ReqBody: 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let (mut parts, body) = request.into_parts();

        if !self.shared.should_trace(&parts) {
            tracing::trace!(
                method = %parts.method,
                path = %parts.uri.path(),
                "Request excluded from tracing"
            );
            return Box::pin(self.inner.call(Request::from_parts(parts, body)));
        }

        let shared = &self.shared;
        let info = RequestInfo::new(&parts);
        let span_name = info.span_name();
        let method = info.method().as_str().to_string();
        let route = info.route().unwrap_or_default().to_string();
        let attributes = shared.span_attributes(&info);

        let parent_cx = shared.propagator.extract(&parts.headers);
        let span = shared
            .tracer
            .span_builder(span_name)
            .with_kind(SpanKind::Server)
            .with_attributes(attributes)
            .start_with_context(&*shared.tracer, &parent_cx);
        let cx = parent_cx.with_span(span);
        let correlation = Correlation::from(cx.span().span_context());
        let guard = SpanGuard { cx: cx.clone() };

        shared.logger.emit(
            Severity::Debug,
            "request received",
            &correlation,
            [
                (Key::from_static_str(LOG_METHOD), AnyValue::from(method.clone())),
                (Key::from_static_str(LOG_ROUTE), AnyValue::from(route.clone())),
            ],
        );
        tracing::debug!(
            target: LOG_TARGET,
            trace_id = %correlation.trace_id,
            span_id = %correlation.span_id,
            method = %method,
            route = %route,
            "request received"
        );

        let errors = HandlerErrors::new();
        parts.extensions.insert(cx.clone());
        parts.extensions.insert(errors.clone());
        parts.extensions.insert(RequestTracer(shared.tracer.clone()));
        let request = Request::from_parts(parts, body);

        // The previous current context comes back when `_attached` drops,
        // including while unwinding out of `call`.
        let future = {
            let _attached = cx.clone().attach();
            self.inner.call(request)
        };

        let traced = TracedRequest {
            guard,
            correlation,
            method,
            route,
            errors,
        };
        let shared = self.shared.clone();
        let mut future = Box::pin(future);
        Box::pin(async move {
            let result = std::future::poll_fn(|task_cx| {
                let _attached = cx.clone().attach();
                future.as_mut().poll(task_cx)
            })
            .await;
            shared.finish(&traced, &result);
            drop(traced);
            result
        })
    }
}
