//! Flatten a JSON document into addressed leaves

use super::path::JsonPath;
use serde_json::Value;

/// Every scalar leaf of `value` paired with the path that reaches it.
///
/// Object keys become key steps and array positions become index steps.
/// Empty objects and arrays contribute nothing.
pub fn flatten(value: &Value) -> Vec<(JsonPath, &Value)> {
    let mut leaves = Vec::new();
    flatten_into(JsonPath::root(), value, &mut leaves);
    leaves
}

fn flatten_into<'a>(prefix: JsonPath, value: &'a Value, leaves: &mut Vec<(JsonPath, &'a Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(prefix.child_key(key.as_str()), child, leaves);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_into(prefix.child_index(i), child, leaves);
            }
        }
        leaf => leaves.push((prefix, leaf)),
    }
}
