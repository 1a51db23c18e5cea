//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TelemetryConfig (validated, immutable)
//!     → telemetry pipelines, filters, demo server
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup and never mutated
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ExporterKind, FilterConfig, ListenerConfig, LoggingConfig, ServiceConfig, TelemetryConfig,
    TimeoutConfig, TracingConfig,
};
pub use validation::{validate_config, ValidationError, ValidationErrors};
