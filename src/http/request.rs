//! Request metadata used by the tracing middleware.
//!
//! # Responsibilities
//! - Resolve the route template the router matched
//! - Resolve the host the client addressed
//! - Offer a read-only view of both to route filters
//!
//! # Design Decisions
//! - Span names use the route template, never the raw path, so span
//!   cardinality stays bounded
//! - Requests without a matched route are named after their method

use axum::extract::MatchedPath;
use axum::http::{header, request::Parts, HeaderMap, Method, Uri};

/// Framework-level view of an inbound request, handed to route filters.
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    parts: &'a Parts,
    route: Option<&'a str>,
    host: &'a str,
}

impl<'a> RequestInfo<'a> {
    pub fn new(parts: &'a Parts) -> Self {
        Self {
            parts,
            route: matched_route(parts),
            host: request_host(parts),
        }
    }

    pub fn method(&self) -> &'a Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &'a Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &'a HeaderMap {
        &self.parts.headers
    }

    /// Route template matched by the router, e.g. `/users/{id}`.
    pub fn route(&self) -> Option<&'a str> {
        self.route
    }

    /// Host the client addressed; empty when unknown.
    pub fn host(&self) -> &'a str {
        self.host
    }

    /// Name for the request span.
    pub fn span_name(&self) -> String {
        match self.route {
            Some(route) => route.to_string(),
            None => self.parts.method.as_str().to_string(),
        }
    }
}

/// Route template recorded by the axum router, if any.
pub fn matched_route(parts: &Parts) -> Option<&str> {
    parts.extensions.get::<MatchedPath>().map(MatchedPath::as_str)
}

/// `Host` header, falling back to the URI authority.
pub fn request_host(parts: &Parts) -> &str {
    parts
        .headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| parts.uri.host())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_host_header_wins() {
        let (parts, _) = Request::builder()
            .uri("http://internal:8080/users/42")
            .header("Host", "api.example.com")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(request_host(&parts), "api.example.com");
    }

    #[test]
    fn test_host_from_uri() {
        let (parts, _) = Request::builder()
            .uri("http://internal:8080/users/42")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(request_host(&parts), "internal");

        let (parts, _) = Request::builder().uri("/users/42").body(()).unwrap().into_parts();
        assert_eq!(request_host(&parts), "");
    }

    #[test]
    fn test_unmatched_request_named_after_method() {
        let (parts, _) = Request::builder()
            .method("POST")
            .uri("/users/42")
            .body(())
            .unwrap()
            .into_parts();
        let info = RequestInfo::new(&parts);
        assert_eq!(info.route(), None);
        assert_eq!(info.span_name(), "POST");
    }
}
