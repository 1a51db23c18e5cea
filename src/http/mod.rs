//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → middleware/filter.rs (trace or skip)
//!     → middleware/trace.rs (extract context, start span, log)
//!     → handler (HandlerErrors, Context, RequestTracer in extensions)
//!     → middleware/trace.rs (status, errors, logs, end span)
//!     → Send to client
//! ```

pub mod errors;
pub mod middleware;
pub mod request;
pub mod server;

pub use errors::{HandlerError, HandlerErrors};
pub use middleware::{RequestTracer, RequestTracing, RequestTracingLayer, TraceOptions};
pub use request::RequestInfo;
pub use server::HttpServer;
