//! Tower middleware.

pub mod filter;
pub mod trace;

pub use filter::{Filter, HostFilter, MethodFilter, PathPrefixFilter, RouteFilter};
pub use trace::{RequestTracer, RequestTracing, RequestTracingLayer, TraceOptions};
