//! Check tool call arguments against the declared parameter schema.
//!
//! Only the top level is checked: object shape, required keys, and the
//! primitive type of each declared property.

use serde_json::Value;

use crate::error::{ConsoleError, Result};

pub fn check_arguments(tool_name: &str, args: &Value, schema: &Value) -> Result<()> {
    let violation = |message: String| Err(ConsoleError::tool(tool_name, message));

    let Some(object) = args.as_object() else {
        if schema.get("type").and_then(Value::as_str) == Some("object") {
            return violation(format!("expected object arguments, got {}", type_name(args)));
        }
        return Ok(());
    };

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    for name in required {
        if !object.contains_key(name) {
            return violation(format!("missing required argument '{name}'"));
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (key, value) in object {
        let expected = properties
            .get(key)
            .and_then(|property| property.get("type"))
            .and_then(Value::as_str);
        if let Some(expected) = expected {
            if !matches_type(value, expected) {
                return violation(format!(
                    "argument '{key}' should be {expected}, got {}",
                    type_name(value)
                ));
            }
        }
    }
    Ok(())
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "lat": { "type": "number" },
                "location": { "type": "string" }
            },
            "required": ["lat", "location"]
        })
    }

    #[test]
    fn accepts_matching_arguments() {
        assert!(check_arguments("t", &json!({"lat": 1.0, "location": "x"}), &schema()).is_ok());
    }

    #[test]
    fn rejects_missing_required() {
        let err = check_arguments("t", &json!({"lat": 1.0}), &schema()).unwrap_err();
        assert!(err.to_string().contains("missing required argument 'location'"));
    }

    #[test]
    fn rejects_wrong_type_and_non_object() {
        let err = check_arguments("t", &json!({"lat": "1", "location": "x"}), &schema()).unwrap_err();
        assert!(matches!(err, ConsoleError::ToolExecution { .. }));
        assert!(check_arguments("t", &json!([1]), &schema()).is_err());
    }
}
