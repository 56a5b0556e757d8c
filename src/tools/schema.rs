//! Minimal JSON Schema checks for tool input.
//!
//! Covers what tool schemas here actually use: an object with `required`
//! keys and primitive `type`s on its `properties`. Anything richer is left
//! to the tool.

use serde_json::Value;

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check `input` against `schema`, returning a message for the model on
/// mismatch.
pub fn validate_input(schema: &Value, input: &Value) -> Result<(), String> {
    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return Ok(());
    }
    let Some(obj) = input.as_object() else {
        return Err(format!("expected an object, got {}", describe(input)));
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        let missing: Vec<&str> = required
            .iter()
            .filter_map(Value::as_str)
            .filter(|key| !obj.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(format!("missing required field(s): {}", missing.join(", ")));
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, value) in obj {
            let Some(expected) = properties
                .get(key)
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            if !type_matches(expected, value) {
                return Err(format!(
                    "field '{}' should be {}, got {}",
                    key,
                    expected,
                    describe(value)
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "limit": {"type": "integer"},
                "recursive": {"type": "boolean"}
            },
            "required": ["path"]
        })
    }

    #[test]
    fn test_valid_input() {
        assert!(validate_input(&schema(), &json!({"path": "src", "limit": 3})).is_ok());
        // unknown keys pass through
        assert!(validate_input(&schema(), &json!({"path": "src", "extra": 1})).is_ok());
    }

    #[test]
    fn test_missing_required() {
        let err = validate_input(&schema(), &json!({"limit": 3})).unwrap_err();
        assert_eq!(err, "missing required field(s): path");
    }

    #[test]
    fn test_wrong_type() {
        let err = validate_input(&schema(), &json!({"path": "src", "limit": "3"})).unwrap_err();
        assert_eq!(err, "field 'limit' should be integer, got string");

        let err = validate_input(&schema(), &json!({"path": "a", "limit": 1.5})).unwrap_err();
        assert!(err.contains("should be integer"));
    }

    #[test]
    fn test_non_object_input() {
        let err = validate_input(&schema(), &json!("src")).unwrap_err();
        assert_eq!(err, "expected an object, got string");
    }

    #[test]
    fn test_schema_without_type_accepts_anything() {
        assert!(validate_input(&json!({}), &json!(42)).is_ok());
    }
}
