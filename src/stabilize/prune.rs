//! Neighborhood pruning
//!
//! Cuts a response body down to the part a resolver needs to judge a
//! path: every container on the path, scalar siblings along the way, a
//! shallow view of neighboring array elements, and a few levels below
//! the target. Everything else becomes a short marker string.
//!
//! Long arrays keep their first few elements and the element on the path;
//! each skipped run collapses into a single marker, so the result stays
//! bounded however deep into an array the target sits. `Pruned::path`
//! addresses the target inside the pruned document.

use crate::locator::{selected_index, JsonPath, PathStep};
use serde_json::{Map, Value};
use thiserror::Error;

/// The recorded path does not resolve against the document.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("path {path} does not resolve at step {step}")]
pub struct PruneError {
    pub path: String,
    /// Index of the first step that failed
    pub step: usize,
}

/// Pruning limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneLimits {
    /// Levels kept below the target
    pub descendant_depth: usize,
    /// Array elements kept; the element on the path is always kept
    pub max_siblings: usize,
}

impl Default for PruneLimits {
    fn default() -> Self {
        Self {
            descendant_depth: 3,
            max_siblings: 20,
        }
    }
}

/// A pruned document and the path of the target inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Pruned {
    pub document: Value,
    /// Same steps as the recorded path, with array indices shifted to
    /// the target's position in `document`
    pub path: JsonPath,
}

/// Prune `doc` around `path`.
pub fn prune(doc: &Value, path: &JsonPath, limits: PruneLimits) -> Result<Pruned, PruneError> {
    let mut local = Vec::with_capacity(path.len());
    let document = prune_along(doc, path.steps(), 0, limits, &mut local).map_err(|step| PruneError {
        path: path.to_string(),
        step,
    })?;
    Ok(Pruned {
        document,
        path: JsonPath::from_steps(local),
    })
}

fn prune_along(
    value: &Value,
    steps: &[PathStep],
    depth: usize,
    limits: PruneLimits,
    local: &mut Vec<PathStep>,
) -> Result<Value, usize> {
    let Some((step, rest)) = steps.split_first() else {
        return Ok(truncate(value, limits.descendant_depth, limits));
    };

    match (step, value) {
        (PathStep::Key(key), Value::Object(map)) => {
            if !map.contains_key(key) {
                return Err(depth);
            }
            local.push(step.clone());
            let mut out = Map::new();
            for (k, v) in map {
                let kept = if k == key {
                    prune_along(v, rest, depth + 1, limits, local)?
                } else {
                    summarize(v)
                };
                out.insert(k.clone(), kept);
            }
            Ok(Value::Object(out))
        }
        (PathStep::Index(_) | PathStep::Where { .. }, Value::Array(items)) => {
            let target = selected_index(items, step).ok_or(depth)?;
            let shown = limits.max_siblings.min(target);
            let mut out: Vec<Value> = items[..shown].iter().map(shallow).collect();
            if target > shown {
                out.push(Value::String(format!("<{} omitted>", target - shown)));
            }

            local.push(match step {
                PathStep::Index(_) => PathStep::Index(out.len()),
                predicate => predicate.clone(),
            });
            out.push(prune_along(&items[target], rest, depth + 1, limits, local)?);

            let after = target + 1;
            let tail = limits.max_siblings.saturating_sub(after).min(items.len() - after);
            out.extend(items[after..after + tail].iter().map(shallow));
            if after + tail < items.len() {
                out.push(Value::String(format!("<{} more>", items.len() - after - tail)));
            }
            Ok(Value::Array(out))
        }
        _ => Err(depth),
    }
}

/// Marker for a container, the value itself for a scalar.
fn summarize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::String(format!("<object with {} keys>", map.len())),
        Value::Array(items) => Value::String(format!("<array of {}>", items.len())),
        scalar => scalar.clone(),
    }
}

/// One level of an array element: its scalars, with containers summarized.
fn shallow(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), summarize(v))).collect()),
        other => summarize(other),
    }
}

fn truncate(value: &Value, depth: usize, limits: PruneLimits) -> Value {
    match value {
        Value::Object(map) if depth > 0 => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), truncate(v, depth - 1, limits)))
                .collect(),
        ),
        Value::Array(items) if depth > 0 => {
            let mut out: Vec<Value> = items
                .iter()
                .take(limits.max_siblings)
                .map(|v| truncate(v, depth - 1, limits))
                .collect();
            if items.len() > limits.max_siblings {
                out.push(Value::String(format!("<{} more>", items.len() - limits.max_siblings)));
            }
            Value::Array(out)
        }
        other => summarize(other),
    }
}
