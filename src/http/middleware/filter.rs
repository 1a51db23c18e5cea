//! Request filters deciding which requests get traced.
//!
//! # Design Decisions
//! - A filter returns `true` to trace the request, `false` to skip it
//! - Filters run in registration order; the first `false` wins
//! - `Filter` sees the request head only; `RouteFilter` also sees what the
//!   router resolved (route template, host)
//! - Path and method matching are case-sensitive, host matching is not

use std::sync::Arc;

use axum::http::{request::Parts, Method};

use crate::config::FilterConfig;
use crate::http::request::RequestInfo;

/// Predicate over the request head.
pub trait Filter: Send + Sync {
    /// Returns true if the request should be traced.
    fn allows(&self, parts: &Parts) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&Parts) -> bool + Send + Sync,
{
    fn allows(&self, parts: &Parts) -> bool {
        self(parts)
    }
}

/// Predicate over the router-resolved view of a request.
pub trait RouteFilter: Send + Sync {
    /// Returns true if the request should be traced.
    fn allows(&self, info: &RequestInfo<'_>) -> bool;
}

impl<F> RouteFilter for F
where
    F: Fn(&RequestInfo<'_>) -> bool + Send + Sync,
{
    fn allows(&self, info: &RequestInfo<'_>) -> bool {
        self(info)
    }
}

/// Skips requests whose path starts with a prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixFilter {
    prefix: String,
}

impl PathPrefixFilter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Filter for PathPrefixFilter {
    fn allows(&self, parts: &Parts) -> bool {
        !parts.uri.path().starts_with(&self.prefix)
    }
}

/// Skips requests using one of the listed methods.
#[derive(Debug, Clone)]
pub struct MethodFilter {
    methods: Vec<Method>,
}

impl MethodFilter {
    pub fn new(methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
        }
    }
}

impl Filter for MethodFilter {
    fn allows(&self, parts: &Parts) -> bool {
        !self.methods.contains(&parts.method)
    }
}

/// Traces only requests addressed to one host.
#[derive(Debug, Clone)]
pub struct HostFilter {
    expected_host: String,
}

impl HostFilter {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl RouteFilter for HostFilter {
    fn allows(&self, info: &RequestInfo<'_>) -> bool {
        info.host().eq_ignore_ascii_case(&self.expected_host)
    }
}

/// Compile the configured skip lists into filters. Unparsable methods are
/// ignored; validation reports them before this runs.
pub fn filters_from_config(config: &FilterConfig) -> Vec<Arc<dyn Filter>> {
    let mut filters: Vec<Arc<dyn Filter>> = config
        .skip_paths
        .iter()
        .map(|prefix| Arc::new(PathPrefixFilter::new(prefix.clone())) as Arc<dyn Filter>)
        .collect();

    let methods: Vec<Method> = config
        .skip_methods
        .iter()
        .filter_map(|m| Method::from_bytes(m.as_bytes()).ok())
        .collect();
    if !methods.is_empty() {
        filters.push(Arc::new(MethodFilter::new(methods)));
    }

    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(method: &str, uri: &str) -> Parts {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_path_prefix_filter() {
        let filter = PathPrefixFilter::new("/health");
        assert!(!filter.allows(&parts("GET", "/health")));
        assert!(!filter.allows(&parts("GET", "/healthz")));
        assert!(filter.allows(&parts("GET", "/users/42")));
    }

    #[test]
    fn test_method_filter() {
        let filter = MethodFilter::new([Method::OPTIONS, Method::HEAD]);
        assert!(!filter.allows(&parts("OPTIONS", "/users")));
        assert!(filter.allows(&parts("GET", "/users")));
    }

    #[test]
    fn test_host_filter() {
        let filter = HostFilter::new("API.example.com");

        let mut head = parts("GET", "/users");
        head.headers.insert("host", "api.example.com".parse().unwrap());
        assert!(filter.allows(&RequestInfo::new(&head)));

        head.headers.insert("host", "other.com".parse().unwrap());
        assert!(!filter.allows(&RequestInfo::new(&head)));
    }

    #[test]
    fn test_closures_are_filters() {
        let only_get = |parts: &Parts| parts.method == Method::GET;
        assert!(Filter::allows(&only_get, &parts("GET", "/")));
        assert!(!Filter::allows(&only_get, &parts("DELETE", "/")));
    }

    #[test]
    fn test_filters_from_config() {
        let config = FilterConfig {
            skip_paths: vec!["/health".into(), "/metrics".into()],
            skip_methods: vec!["OPTIONS".into()],
        };
        let filters = filters_from_config(&config);
        assert_eq!(filters.len(), 3);

        let traced = |p: &Parts| filters.iter().all(|f| f.allows(p));
        assert!(!traced(&parts("GET", "/metrics")));
        assert!(!traced(&parts("OPTIONS", "/users")));
        assert!(traced(&parts("GET", "/users")));
    }
}
