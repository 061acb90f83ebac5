//! Opaque user session claims
//!
//! A session is a per-request/per-connection bag of claims produced by the
//! session resolver. The runners never interpret or mutate it; identity
//! matters only to permission checks and handlers. Channels may replace a
//! connection's session after late authentication.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};

/// Claim bag resolved per request or connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserSession {
    claims: Map<String, Value>,
}

impl UserSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_claims(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    /// Build a session from a JSON value; anything but an object is rejected
    pub fn from_value(value: Value) -> ApiResult<Self> {
        match value {
            Value::Object(claims) => Ok(Self { claims }),
            other => Err(ApiError::invalid_session(format!(
                "session claims must be an object, got {}",
                value_type_name(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.claims.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.claims.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.claims.get(key).and_then(Value::as_bool)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.claims.insert(key.into(), value);
    }

    /// Conventional subject claim: `sub`, falling back to `userId`
    pub fn user_id(&self) -> Option<&str> {
        self.get_str("sub").or_else(|| self.get_str("userId"))
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn into_claims(self) -> Map<String, Value> {
        self.claims
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
