//! Locator resolvers

use super::oracle::{parse_reply, TextOracle};
use super::{CollaboratorError, LocatorResolver, ResolveRequest};
use crate::locator::{step_into, JsonPath, PathStep, PredicateValue};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const RESOLVE_PROMPT: &str = r#"
The input has a JSON snippet ("neighborhood") cut from a larger response,
the path of a value in the full response ("current_path"), the same value's
path inside the snippet ("neighborhood_path", where skipped array elements
are collapsed into "<N omitted>" markers), the value itself ("value"), and
where later requests use it ("usage_paths"). Find a path into the full
response that keeps selecting the same value when the response changes shape.
- If plain keys and indices (e.g. data.items[0].id) are stable, return that.
- Rewrite an index to [0] only if that does not change which element is selected.
- If array positions can vary, select the element with a predicate on a
  sibling field, e.g. offers[?(@.type=='hotel')].id
Return only the path, with no explanation or markup.
"#;

/// Asks the text oracle for a stable path.
pub struct OracleResolver {
    oracle: Arc<dyn TextOracle>,
}

impl OracleResolver {
    pub fn new(oracle: Arc<dyn TextOracle>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl LocatorResolver for OracleResolver {
    async fn resolve(&self, request: &ResolveRequest) -> Result<String, CollaboratorError> {
        let payload =
            serde_json::to_string(request).map_err(|e| CollaboratorError::InvocationFailed(e.to_string()))?;
        let reply = self.oracle.complete(RESOLVE_PROMPT, &payload).await?;
        parse_path_reply(&reply)
    }
}

/// Pull a path out of a reply: `{"path": ...}` or the first meaningful line.
fn parse_path_reply(reply: &str) -> Result<String, CollaboratorError> {
    if let Some(path) = parse_reply(reply)
        .as_ref()
        .and_then(|v| v.get("path"))
        .and_then(Value::as_str)
    {
        let path = path.trim();
        if !path.is_empty() {
            return Ok(path.to_string());
        }
    }

    reply
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("```"))
        .map(|line| line.trim_matches(|c| c == '`' || c == '"').trim().to_string())
        .filter(|line| !line.is_empty())
        .ok_or_else(|| CollaboratorError::ParseError("empty path in reply".to_string()))
}

/// Identity resolver: always keeps the recorded path.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepPathResolver;

#[async_trait]
impl LocatorResolver for KeepPathResolver {
    async fn resolve(&self, request: &ResolveRequest) -> Result<String, CollaboratorError> {
        Ok(request.current_path.clone())
    }
}

/// Offline resolver working on the pruned neighborhood alone.
///
/// Each array index on the path is replaced with a predicate on a sibling
/// scalar field that singles out the element, when one exists. Strings
/// are preferred over numbers. Existing predicates are left as they are,
/// so running the resolver on its own output changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralResolver;

impl StructuralResolver {
    /// Stabilize `path` against `doc`. The chained literal never becomes a
    /// predicate, since replay would need the value to find the value.
    pub fn stabilize(doc: &Value, path: &JsonPath, literal: &str) -> JsonPath {
        let steps = path.steps();
        let mut out = Vec::with_capacity(steps.len());
        let mut current = Some(doc);

        for (i, step) in steps.iter().enumerate() {
            let mut chosen = step.clone();
            if let (PathStep::Index(index), Some(Value::Array(items))) = (step, current) {
                let next_key = match steps.get(i + 1) {
                    Some(PathStep::Key(key)) => Some(key.as_str()),
                    _ => None,
                };
                if let Some(predicate) = discriminating_predicate(items, *index, next_key, literal) {
                    chosen = predicate;
                }
            }
            current = current.and_then(|node| step_into(node, step));
            out.push(chosen);
        }

        JsonPath::from_steps(out)
    }
}

#[async_trait]
impl LocatorResolver for StructuralResolver {
    async fn resolve(&self, request: &ResolveRequest) -> Result<String, CollaboratorError> {
        let parse = |text: &str| JsonPath::parse(text).map_err(|e| CollaboratorError::ParseError(e.to_string()));
        let recorded = parse(&request.current_path)?;
        let local = if request.neighborhood_path.trim().is_empty() {
            recorded.clone()
        } else {
            parse(&request.neighborhood_path)?
        };
        if local.len() != recorded.len() {
            return Ok(recorded.to_string());
        }

        // Predicates carry over as they are; indices that stay must be the recorded ones.
        let stabilized = Self::stabilize(&request.neighborhood, &local, &request.value);
        let steps = stabilized
            .steps()
            .iter()
            .zip(recorded.steps())
            .map(|(found, original)| match found {
                PathStep::Index(_) => original.clone(),
                other => other.clone(),
            })
            .collect();
        Ok(JsonPath::from_steps(steps).to_string())
    }
}

fn canonical_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn discriminating_predicate(items: &[Value], index: usize, exclude: Option<&str>, literal: &str) -> Option<PathStep> {
    if items.len() < 2 {
        return None;
    }
    let element = items.get(index)?.as_object()?;

    let candidates = element.iter().filter(|(field, value)| {
        Some(field.as_str()) != exclude
            && canonical_scalar(value).is_some_and(|s| !s.is_empty() && s != literal)
    });
    let (strings, numbers): (Vec<_>, Vec<_>) = candidates.partition(|(_, value)| value.is_string());

    strings.into_iter().chain(numbers).find_map(|(field, value)| {
        let matching = items
            .iter()
            .filter(|item| item.get(field).and_then(canonical_scalar) == canonical_scalar(value))
            .count();
        if matching != 1 {
            return None;
        }
        Some(PathStep::Where {
            field: field.clone(),
            equals: PredicateValue::from_json(value)?,
        })
    })
}
