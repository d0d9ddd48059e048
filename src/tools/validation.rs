//! Structural check of decoded tool arguments against a tool's signature.

/// Validate decoded arguments against a tool's parameter schema.
///
/// Rejects non-object arguments, argument names the signature does not
/// declare, and missing required arguments. Value types are not checked.
/// Returns `Err(message)` describing the first violation found.
pub fn validate_arguments(
    args: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(), String> {
    let Some(obj) = args.as_object() else {
        return Err(format!("expected object arguments, got {}", json_type_name(args)));
    };

    if let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) {
        if let Some(unknown) = obj.keys().find(|k| !properties.contains_key(k.as_str())) {
            return Err(format!("unexpected argument '{unknown}'"));
        }
    } else if let Some(first) = obj.keys().next() {
        return Err(format!("unexpected argument '{first}'"));
    }

    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        for name in required.iter().filter_map(|f| f.as_str()) {
            if !obj.contains_key(name) {
                return Err(format!("missing required argument '{name}'"));
            }
        }
    }

    Ok(())
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
