// Closed value-kind classification and the drain-time zero check.
use serde_json::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Other,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => ValueKind::String,
            Value::Number(number) if number.is_f64() => ValueKind::Float,
            Value::Number(_) => ValueKind::Integer,
            _ => ValueKind::Other,
        }
    }
}

/// Returns true when `value` is the zero of its kind: an empty string,
/// integer zero, or float zero. Booleans, arrays, objects and null are
/// never considered zero here.
pub fn is_zero(value: &Value) -> bool {
    match (ValueKind::of(value), value) {
        (ValueKind::String, Value::String(text)) => text.is_empty(),
        (ValueKind::Integer, Value::Number(number)) => {
            number.as_i64() == Some(0) || number.as_u64() == Some(0)
        }
        (ValueKind::Float, Value::Number(number)) => number.as_f64() == Some(0.0),
        _ => false,
    }
}

/// A value a drain emits: present and not the zero of its kind.
pub fn is_significant(value: &Value) -> bool {
    !value.is_null() && !is_zero(value)
}
