use serde_json::Value;

/// A content record: field name → JSON value.
pub type Record = serde_json::Map<String, Value>;

/// JavaScript-style truthiness, which is how source systems flag presence
/// (`""`, `0`, `false` and `null` all mean "absent").
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
