//! Errors recorded by handlers during a traced request.
//!
//! Handlers report errors without turning them into responses: either by
//! pushing onto the request's [`HandlerErrors`] or by attaching a
//! [`HandlerError`] to the response extensions. The tracing middleware merges
//! both once the handler returns.

use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// One error reported by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(err: impl fmt::Display) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Request-scoped error recorder.
///
/// Clones share the same list. Displays as one `Error #NN: message` line per
/// error.
#[derive(Debug, Clone, Default)]
pub struct HandlerErrors {
    inner: Arc<Mutex<Vec<HandlerError>>>,
}

impl HandlerErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, err: impl fmt::Display) {
        self.lock().push(HandlerError::new(err));
    }

    pub fn extend(&self, errors: impl IntoIterator<Item = HandlerError>) {
        self.lock().extend(errors);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the errors recorded so far.
    pub fn snapshot(&self) -> Vec<HandlerError> {
        self.lock().clone()
    }

    // A handler that panicked while pushing leaves a usable list behind.
    fn lock(&self) -> MutexGuard<'_, Vec<HandlerError>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Display for HandlerErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.lock().iter().enumerate() {
            writeln!(f, "Error #{:02}: {}", i + 1, err)?;
        }
        Ok(())
    }
}

/// Yields the recorder installed by the tracing middleware, or a detached
/// one when the request is not traced.
impl<S> FromRequestParts<S> for HandlerErrors
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<HandlerErrors>().cloned().unwrap_or_default())
    }
}
