//! Tagged error model for the dispatch pipeline
//!
//! Errors carry an enumerable [`ErrorKind`] discriminant rather than relying
//! on type identity. The kind is the lookup key into the
//! [`ErrorRegistry`](crate::registry::ErrorRegistry), which decides the wire
//! status and default message; the error itself may override the message and
//! attach a payload for registered kinds.

use std::fmt;

use serde_json::Value;
use uuid::Uuid;

/// Common result type for dispatch operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Enumerable error discriminants
///
/// The named variants cover the registered catalogue shipped in the default
/// [`ErrorRegistry`](crate::registry::ErrorRegistry). Applications introduce
/// their own kinds with [`ErrorKind::Custom`] and register them alongside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    InvalidOrigin,
    MissingSession,
    InvalidSession,
    Forbidden,
    NotFound,
    RouteNotFound,
    MethodNotAllowed,
    RequestTimeout,
    MaxComputeTime,
    Conflict,
    Gone,
    PayloadTooLarge,
    UnsupportedMediaType,
    TooManyRequests,
    Internal,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    /// Application-defined kind, keyed by a stable name
    Custom(&'static str),
}

impl ErrorKind {
    /// Stable name of this kind, used in logs and lookups
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::InvalidOrigin => "invalid-origin",
            ErrorKind::MissingSession => "missing-session",
            ErrorKind::InvalidSession => "invalid-session",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not-found",
            ErrorKind::RouteNotFound => "route-not-found",
            ErrorKind::MethodNotAllowed => "method-not-allowed",
            ErrorKind::RequestTimeout => "request-timeout",
            ErrorKind::MaxComputeTime => "max-compute-time",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Gone => "gone",
            ErrorKind::PayloadTooLarge => "payload-too-large",
            ErrorKind::UnsupportedMediaType => "unsupported-media-type",
            ErrorKind::TooManyRequests => "too-many-requests",
            ErrorKind::Internal => "internal",
            ErrorKind::NotImplemented => "not-implemented",
            ErrorKind::BadGateway => "bad-gateway",
            ErrorKind::ServiceUnavailable => "service-unavailable",
            ErrorKind::GatewayTimeout => "gateway-timeout",
            ErrorKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain error carried through the dispatch pipeline
///
/// The `message` field overrides the registry's default message when the
/// error reaches the wire; validation failures use this to surface the
/// aggregated validator text. Unregistered kinds never reach the client
/// verbatim and collapse to a 500 body carrying only an error id.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", fmt_error(.kind, .message))]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: Option<String>,
    pub payload: Option<Value>,
    pub error_id: Option<String>,
    pub trace_id: Option<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            payload: None,
            error_id: None,
            trace_id: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_error_id(mut self, error_id: impl Into<String>) -> Self {
        self.error_id = Some(error_id.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Create a bad-request error carrying validator text
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest).with_message(message)
    }

    /// Create a missing-session error (no credential presented)
    pub fn missing_session() -> Self {
        Self::new(ErrorKind::MissingSession)
    }

    /// Create an invalid-session error (malformed or rejected credential)
    pub fn invalid_session(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSession).with_message(message)
    }

    /// Create a forbidden error (no permission group satisfied)
    pub fn forbidden() -> Self {
        Self::new(ErrorKind::Forbidden)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound).with_message(message)
    }

    /// Create a route-not-found error for an unmatched (method, path)
    pub fn route_not_found(path: &str) -> Self {
        Self::new(ErrorKind::RouteNotFound).with_message(format!("no route matches '{}'", path))
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented).with_message(message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(message)
    }

    /// Trace id for this error, generating and storing one if absent
    ///
    /// Reusing an already-assigned id keeps correlation stable when the same
    /// error crosses layers.
    pub fn ensure_trace_id(&mut self) -> &str {
        if self.trace_id.is_none() {
            self.trace_id = Some(new_trace_id());
        }
        self.trace_id.as_deref().unwrap_or_default()
    }
}

fn fmt_error(kind: &ErrorKind, message: &Option<String>) -> String {
    match message {
        Some(message) => format!("{}: {}", kind, message),
        None => kind.as_str().to_string(),
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::internal(format!("serialization error: {}", err))
    }
}

/// Generate a fresh trace id (UUID v7 for temporal ordering)
pub fn new_trace_id() -> String {
    Uuid::now_v7().to_string()
}
