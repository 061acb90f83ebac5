//! Error registry mapping kinds to wire responses
//!
//! The registry is a plain `kind -> (status, message)` table owned by the
//! composition root. The default table covers the full registered catalogue;
//! applications add their own kinds with [`ErrorRegistry::register`] or
//! re-register a built-in kind at a different status.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ErrorKind, new_trace_id};

/// A registered (status, message) pair for an error kind
#[derive(Debug, Clone)]
pub struct ErrorEntry {
    pub status: u16,
    pub message: String,
}

/// Wire shape of a failed response
///
/// Mapped errors carry `message` (and optionally `payload`/`errorId`);
/// unmapped errors carry only `errorId`. Every failure carries `traceId` so
/// server logs can be correlated without leaking internal detail.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponseBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Kind-to-response table consulted during error mapping
#[derive(Debug, Clone)]
pub struct ErrorRegistry {
    entries: HashMap<ErrorKind, ErrorEntry>,
}

impl Default for ErrorRegistry {
    fn default() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
        };
        registry.register(ErrorKind::BadRequest, 400, "Bad request");
        registry.register(ErrorKind::InvalidOrigin, 400, "Invalid origin");
        registry.register(ErrorKind::MissingSession, 401, "Missing session");
        registry.register(ErrorKind::InvalidSession, 401, "Invalid session");
        registry.register(ErrorKind::Forbidden, 403, "Forbidden");
        registry.register(ErrorKind::NotFound, 404, "Not found");
        registry.register(ErrorKind::RouteNotFound, 404, "Route not found");
        registry.register(ErrorKind::MethodNotAllowed, 405, "Method not allowed");
        registry.register(ErrorKind::RequestTimeout, 408, "Request timeout");
        registry.register(ErrorKind::MaxComputeTime, 408, "Maximum compute time reached");
        registry.register(ErrorKind::Conflict, 409, "Conflict");
        registry.register(ErrorKind::Gone, 410, "Gone");
        registry.register(ErrorKind::PayloadTooLarge, 413, "Payload too large");
        registry.register(ErrorKind::UnsupportedMediaType, 415, "Unsupported media type");
        registry.register(ErrorKind::TooManyRequests, 429, "Too many requests");
        registry.register(ErrorKind::Internal, 500, "Internal server error");
        registry.register(ErrorKind::NotImplemented, 501, "Not implemented");
        registry.register(ErrorKind::BadGateway, 502, "Bad gateway");
        registry.register(ErrorKind::ServiceUnavailable, 503, "Service unavailable");
        registry.register(ErrorKind::GatewayTimeout, 504, "Gateway timeout");
        registry
    }
}

impl ErrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with no entries at all (every error maps to 500)
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register or replace the response for an error kind
    pub fn register(&mut self, kind: ErrorKind, status: u16, message: impl Into<String>) {
        self.entries.insert(
            kind,
            ErrorEntry {
                status,
                message: message.into(),
            },
        );
    }

    pub fn lookup(&self, kind: ErrorKind) -> Option<&ErrorEntry> {
        self.entries.get(&kind)
    }

    /// Render an error to its wire status and body
    ///
    /// Returns `(status, body, mapped)`. For mapped kinds, the error's own
    /// message overrides the registry default. Unmapped kinds collapse to a
    /// 500 body carrying only the error id; the message never leaks.
    pub fn render(&self, err: &ApiError) -> (u16, ErrorResponseBody, bool) {
        let trace_id = err.trace_id.clone().unwrap_or_else(new_trace_id);
        match self.lookup(err.kind) {
            Some(entry) => {
                let body = ErrorResponseBody {
                    message: Some(
                        err.message
                            .clone()
                            .unwrap_or_else(|| entry.message.clone()),
                    ),
                    payload: err.payload.clone(),
                    error_id: err.error_id.clone(),
                    trace_id: Some(trace_id),
                };
                (entry.status, body, true)
            }
            None => {
                let body = ErrorResponseBody {
                    error_id: Some(err.error_id.clone().unwrap_or_else(|| trace_id.clone())),
                    trace_id: Some(trace_id),
                    ..Default::default()
                };
                (500, body, false)
            }
        }
    }
}
