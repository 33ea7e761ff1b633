//! Deep merge for command schemas contributed in parts.
//!
//! - objects merge key by key, recursively
//! - arrays of named objects merge by `name`, recursively, keeping order
//! - other array items are appended unless already present
//! - scalars are replaced by the incoming value

use serde_json::Value;

/// Merges `incoming` into `target`.
pub fn merge_values(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(incoming)) => {
            for item in incoming {
                merge_array_item(target, item);
            }
        }
        (target, incoming) => *target = incoming,
    }
}

fn merge_array_item(target: &mut Vec<Value>, item: Value) {
    if let Some(name) = item_name(&item) {
        if let Some(existing) = target
            .iter_mut()
            .find(|existing| item_name(existing) == Some(name))
        {
            merge_values(existing, item);
            return;
        }
    } else if target.contains(&item) {
        return;
    }
    target.push(item);
}

fn item_name(value: &Value) -> Option<&str> {
    value.get("name").and_then(Value::as_str)
}
