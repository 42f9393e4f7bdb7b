//! Record helpers: system fields, timestamps and loose value equality.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use super::Record;

/// Reserved fields the server owns. Clients can never write them directly.
pub const SYSTEM_FIELDS: [&str; 4] = ["_id", "_createdOn", "_updatedOn", "_ownerId"];

/// Current time in epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Copy every non-system field of `entry` onto `target`.
pub fn assign_clean(target: &mut Record, entry: &Record) {
    for (key, value) in entry {
        if !SYSTEM_FIELDS.contains(&key.as_str()) {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Copy the system fields `entry` carries onto `target`, overwriting.
pub fn assign_system(target: &mut Record, entry: &Record) {
    for field in SYSTEM_FIELDS {
        if let Some(value) = entry.get(field) {
            target.insert(field.to_string(), value.clone());
        }
    }
}

/// Owned copy of `record` with `_id` attached.
pub fn with_id(record: &Record, id: &str) -> Record {
    let mut copy = record.clone();
    copy.insert("_id".into(), Value::String(id.to_string()));
    copy
}

/// Loose equality in the manner of a dynamically-typed `==`.
///
/// Primitives of different kinds are coerced to numbers (`"5" == 5`,
/// `true == 1`); `null` equals only `null`; arrays and objects compare
/// structurally.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(_), Value::Number(_)) => a.as_f64() == b.as_f64(),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => a == b,
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => false,
        _ => match (to_number(a), to_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}
