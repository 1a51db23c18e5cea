//! Attribute keys attached to request spans and log records.

use opentelemetry_semantic_conventions::{attribute, resource};

/// `service.name`
pub const SERVICE_NAME: &str = resource::SERVICE_NAME;

pub const RPC_SYSTEM: &str = attribute::RPC_SYSTEM;
pub const RPC_SERVICE: &str = attribute::RPC_SERVICE;
pub const RPC_METHOD: &str = attribute::RPC_METHOD;
pub const RPC_GRPC_STATUS_CODE: &str = attribute::RPC_GRPC_STATUS_CODE;

/// Deprecated upstream in favour of `server.address` / `client.address`.
#[allow(deprecated)]
pub const NET_PEER_NAME: &str = attribute::NET_PEER_NAME;

/// Serialized handler errors.
pub const HANDLER_ERRORS: &str = "axum.errors";

/// Value of `rpc.system` on every request span.
pub const RPC_SYSTEM_VALUE: &str = "grpc";

// Log record attributes.
pub const LOG_TRACE_ID: &str = "trace_id";
pub const LOG_SPAN_ID: &str = "span_id";
pub const LOG_METHOD: &str = "method";
pub const LOG_ROUTE: &str = "route";
pub const LOG_STATUS: &str = "status";
pub const LOG_ERRORS: &str = "errors";
