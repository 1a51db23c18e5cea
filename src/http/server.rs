//! Demo HTTP server exercising the tracing middleware.
//!
//! # Responsibilities
//! - Create Axum Router with the demo handlers
//! - Wire up middleware (request tracing, timeout, request ID)
//! - Serve on a listener until shutdown is signalled

use std::time::Duration;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{Context, KeyValue};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

use crate::config::TelemetryConfig;
use crate::http::errors::{HandlerError, HandlerErrors};
use crate::http::middleware::{RequestTracer, RequestTracingLayer};

/// HTTP server for the demo service.
pub struct HttpServer {
    router: Router,
    config: TelemetryConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: TelemetryConfig, layer: RequestTracingLayer) -> Self {
        let router = Self::build_router(&config, layer);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The tracing layer is applied to the routes, not around the router, so
    /// every request carries its matched route template. The timeout sits
    /// inside it so a timed-out request is recorded with its 408.
    pub fn build_router(config: &TelemetryConfig, layer: RequestTracingLayer) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/users/{id}", get(get_user))
            .route("/echo", post(echo))
            .route("/fail", get(fail))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.timeouts.request_secs),
            ))
            .layer(layer)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Router with all layers applied, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.config.service.name,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Looks a user up. Id 0 never exists; the miss is recorded as a handler
/// error.
///
/// Untraced requests carry no request context, so the lookup span falls back
/// to the current one.
async fn get_user(
    Path(id): Path<u64>,
    errors: HandlerErrors,
    tracer: RequestTracer,
    cx: Option<Extension<Context>>,
) -> Response {
    let cx = cx.map(|Extension(cx)| cx).unwrap_or_else(Context::current);
    let mut span = tracer.start_with_context("users.lookup", &cx);
    span.set_attribute(KeyValue::new("user.id", id as i64));
    let found = id != 0;
    span.end();

    if found {
        Json(json!({ "id": id, "name": format!("user-{id}") })).into_response()
    } else {
        errors.push(format!("user {id} not found"));
        (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
    }
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}

async fn fail() -> Result<&'static str, AppError> {
    Err(AppError::UpstreamUnavailable)
}

#[derive(Debug, Error)]
enum AppError {
    #[error("upstream unavailable")]
    UpstreamUnavailable,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::BAD_GATEWAY, self.to_string()).into_response();
        response.extensions_mut().insert(HandlerError::new(&self));
        response
    }
}
