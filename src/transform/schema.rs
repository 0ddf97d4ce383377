use serde_json::Value;

/// Keys the target protocol rejects in tool-parameter schemas.
const DROPPED_KEYS: [&str; 3] = ["$schema", "strict", "additionalProperties"];

/// Strip unsupported JSON-Schema keys at every nesting level.
///
/// Pure recursive transform: drops `$schema`, `strict` and
/// `additionalProperties` wherever they appear, recursing into object values
/// and array elements. All other structure is left untouched.
#[must_use]
pub fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !DROPPED_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), sanitize_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}
