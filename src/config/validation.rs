//! Configuration validation.
//!
//! Serde handles syntactic checks; this module checks value ranges and
//! cross-field rules. Validation reports every problem it finds, not just the
//! first one.

use std::fmt;
use std::net::SocketAddr;

use axum::http::Method;
use url::Url;

use crate::config::schema::{ExporterKind, TelemetryConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `tracing.sample_ratio`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All problems found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

/// Check that an exporter endpoint is an absolute http(s) URL.
pub fn parse_endpoint(endpoint: &str) -> Result<Url, String> {
    let url = Url::parse(endpoint).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme `{}`", other)),
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &TelemetryConfig) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::new("service.name", "must not be empty"));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    if let Some(endpoint) = &config.tracing.endpoint {
        if let Err(reason) = parse_endpoint(endpoint) {
            errors.push(ValidationError::new("tracing.endpoint", reason));
        }
    }

    if !(0.0..=1.0).contains(&config.tracing.sample_ratio) {
        errors.push(ValidationError::new("tracing.sample_ratio", "must be within [0, 1]"));
    }

    if config.logging.exporter == ExporterKind::None {
        errors.push(ValidationError::new(
            "logging.exporter",
            "must be `otlp` or `stdout`; the middleware requires a log pipeline",
        ));
    }

    if let Some(endpoint) = &config.logging.endpoint {
        if let Err(reason) = parse_endpoint(endpoint) {
            errors.push(ValidationError::new("logging.endpoint", reason));
        }
    }

    for (i, path) in config.filters.skip_paths.iter().enumerate() {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("filters.skip_paths[{}]", i),
                "must start with `/`",
            ));
        }
    }

    for (i, method) in config.filters.skip_methods.iter().enumerate() {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("filters.skip_methods[{}]", i),
                format!("`{}` is not an HTTP method", method),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}
