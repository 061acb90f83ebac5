//! Compile-and-cache validator registry

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use junction_core::{ApiError, ApiResult};

use crate::coerce::coerce_singletons_to_arrays;

/// Named validator registry
///
/// `register` stores raw schema documents; `load` compiles them on first use
/// and caches the compiled validator; `validate_and_coerce` gates pipeline
/// data against a pre-loaded validator.
#[derive(Default)]
pub struct SchemaRegistry {
    raw: Mutex<HashMap<String, Value>>,
    compiled: Mutex<HashMap<String, Arc<jsonschema::Validator>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw schema document under a name
    pub fn register(&self, name: impl Into<String>, schema: Value) {
        self.raw.lock().insert(name.into(), schema);
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.compiled.lock().contains_key(name)
    }

    /// Compile and cache the named schema; idempotent
    ///
    /// An unregistered name or a schema that fails to compile is an internal
    /// error: both signal a registration/ordering bug, not bad client input.
    pub fn load(&self, name: &str) -> ApiResult<()> {
        if self.is_loaded(name) {
            return Ok(());
        }
        let schema = self
            .raw
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::internal(format!("schema '{}' is not registered", name)))?;
        let validator = jsonschema::validator_for(&schema).map_err(|err| {
            ApiError::internal(format!("failed to compile schema '{}': {}", name, err))
        })?;
        debug!(schema = name, "compiled schema validator");
        self.compiled
            .lock()
            .insert(name.to_string(), Arc::new(validator));
        Ok(())
    }

    /// Validate pipeline data against a named, pre-loaded validator
    ///
    /// A `None` schema name is a no-op. A missing compiled validator is an
    /// internal error. Validation failure surfaces as a bad request carrying
    /// the aggregated validator messages, never internal exception text.
    pub fn validate_and_coerce(
        &self,
        schema_name: Option<&str>,
        data: &mut Value,
        coerce_to_array: bool,
    ) -> ApiResult<()> {
        let Some(name) = schema_name else {
            return Ok(());
        };
        let validator = self
            .compiled
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| {
                ApiError::internal(format!("validator for schema '{}' was never loaded", name))
            })?;
        if coerce_to_array {
            let raw_schema = self.raw.lock().get(name).cloned();
            if let Some(schema) = raw_schema {
                coerce_singletons_to_arrays(&schema, data);
            }
        }
        let messages: Vec<String> = validator
            .iter_errors(data)
            .map(|err| err.to_string())
            .collect();
        if messages.is_empty() {
            Ok(())
        } else {
            Err(ApiError::bad_request(messages.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junction_core::ErrorKind;
    use serde_json::json;

    fn widget_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["name"],
            "additionalProperties": true
        })
    }

    #[test]
    fn test_load_is_idempotent() {
        let registry = SchemaRegistry::new();
        registry.register("widget", widget_schema());
        registry.load("widget").unwrap();
        registry.load("widget").unwrap();
        assert!(registry.is_loaded("widget"));
    }

    #[test]
    fn test_load_unregistered_schema_fails() {
        let registry = SchemaRegistry::new();
        let err = registry.load("missing").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[test]
    fn test_load_propagates_compile_failure() {
        let registry = SchemaRegistry::new();
        registry.register("broken", json!({"type": "not-a-type"}));
        let err = registry.load("broken").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[test]
    fn test_validate_none_schema_is_noop() {
        let registry = SchemaRegistry::new();
        let mut data = json!({"anything": "goes"});
        registry.validate_and_coerce(None, &mut data, false).unwrap();
    }

    #[test]
    fn test_validate_requires_preloaded_validator() {
        let registry = SchemaRegistry::new();
        registry.register("widget", widget_schema());
        let mut data = json!({"name": "Foo"});
        let err = registry
            .validate_and_coerce(Some("widget"), &mut data, false)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[test]
    fn test_validation_failure_carries_validator_text() {
        let registry = SchemaRegistry::new();
        registry.register("widget", widget_schema());
        registry.load("widget").unwrap();
        let mut data = json!({});
        let err = registry
            .validate_and_coerce(Some("widget"), &mut data, false)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadRequest);
        let message = err.message.unwrap_or_default();
        assert!(message.contains("name"), "message should name the field: {}", message);
    }

    #[test]
    fn test_coercion_applies_before_validation() {
        let registry = SchemaRegistry::new();
        registry.register("widget", widget_schema());
        registry.load("widget").unwrap();
        let mut data = json!({"name": "Foo", "tags": "rust"});
        registry
            .validate_and_coerce(Some("widget"), &mut data, true)
            .unwrap();
        assert_eq!(data["tags"], json!(["rust"]));
    }

    #[test]
    fn test_without_coercion_singleton_fails() {
        let registry = SchemaRegistry::new();
        registry.register("widget", widget_schema());
        registry.load("widget").unwrap();
        let mut data = json!({"name": "Foo", "tags": "rust"});
        let err = registry
            .validate_and_coerce(Some("widget"), &mut data, false)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadRequest);
    }
}
