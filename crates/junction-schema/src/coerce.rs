//! Singleton-to-array coercion for loosely-typed transports
//!
//! Query strings cannot distinguish `?tag=a` from a one-element list. When a
//! schema declares a field as `"type": "array"` and the incoming data holds a
//! single non-array value, the value is wrapped before validation.

use serde_json::Value;

/// Wrap singleton values in one-element arrays for array-typed fields
///
/// Only top-level object properties are considered; `null` is left alone so
/// optional fields stay absent-shaped.
pub fn coerce_singletons_to_arrays(schema: &Value, data: &mut Value) {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return;
    };
    let Value::Object(fields) = data else {
        return;
    };
    for (name, field_schema) in properties {
        if field_schema.get("type").and_then(Value::as_str) != Some("array") {
            continue;
        }
        if let Some(value) = fields.get_mut(name) {
            if !value.is_array() && !value.is_null() {
                let singleton = value.take();
                *value = Value::Array(vec![singleton]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wraps_singleton_for_array_fields() {
        let schema = json!({
            "type": "object",
            "properties": {
                "tags": {"type": "array", "items": {"type": "string"}},
                "name": {"type": "string"}
            }
        });
        let mut data = json!({"tags": "rust", "name": "solo"});
        coerce_singletons_to_arrays(&schema, &mut data);
        assert_eq!(data, json!({"tags": ["rust"], "name": "solo"}));
    }

    #[test]
    fn test_leaves_arrays_and_nulls_alone() {
        let schema = json!({
            "type": "object",
            "properties": {"tags": {"type": "array"}}
        });
        let mut data = json!({"tags": ["a", "b"]});
        coerce_singletons_to_arrays(&schema, &mut data);
        assert_eq!(data, json!({"tags": ["a", "b"]}));

        let mut data = json!({"tags": null});
        coerce_singletons_to_arrays(&schema, &mut data);
        assert_eq!(data, json!({"tags": null}));
    }

    #[test]
    fn test_non_object_data_untouched() {
        let schema = json!({"type": "object", "properties": {"xs": {"type": "array"}}});
        let mut data = json!("scalar");
        coerce_singletons_to_arrays(&schema, &mut data);
        assert_eq!(data, json!("scalar"));
    }
}
