//! Request tracing for axum services.
//!
//! [`RequestTracingLayer`] gives every request that passes its filters one
//! OpenTelemetry server span and three correlated log records, parented on
//! the W3C trace context the caller sent.
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use otelaxum::{RequestTracingLayer, TraceOptions};
//!
//! # fn build() -> otelaxum::Result<Router> {
//! let layer = RequestTracingLayer::new("users", TraceOptions::new())?;
//! let app: Router = Router::new()
//!     .route("/users/{id}", get(|| async { "ok" }))
//!     .layer(layer);
//! # Ok(app)
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::TelemetryConfig;
pub use error::{Error, Result};
pub use http::{HandlerError, HandlerErrors, HttpServer, RequestTracingLayer, TraceOptions};
pub use lifecycle::Shutdown;
pub use observability::Telemetry;
