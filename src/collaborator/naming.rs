//! Variable and item naming

use super::oracle::{parse_reply, TextOracle};
use super::{CollaboratorError, Namer, NamingRequest, NamingResult, RequestNameRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

const VARIABLE_PROMPT: &str = r#"
Come up with variable names for values captured from API responses.
Each input has the URL that was called, the path in the response the
value comes from, an example value, and optionally a hint or a proposed
name. Names must be unique, descriptive and camelCase, without filler
words like "value" or "identifier" unless they are essential.

Return a JSON array with exactly one entry per input, in the same order.
Each entry is either a string (the name) or an object
{"name": "...", "init_script": "..."} when the value needs JavaScript
to be initialized before the first request. Return only the JSON.
"#;

const REQUEST_PROMPT: &str = r#"
Name the API calls below. Each input has the method, the URL, and its
position in the recorded sequence. Give each call a short, descriptive
name a person would recognize. Repeated calls may share a name.

Return a JSON array with exactly one entry per input, in the same order:
either a string or an object {"name": "..."}. Return only the JSON.
"#;

/// Names from the text oracle.
pub struct OracleNamer {
    oracle: Arc<dyn TextOracle>,
}

impl OracleNamer {
    pub fn new(oracle: Arc<dyn TextOracle>) -> Self {
        Self { oracle }
    }

    async fn ask(&self, prompt: &str, payload: String, expected: usize) -> Result<Vec<NamingResult>, CollaboratorError> {
        let reply = self.oracle.complete(prompt, &payload).await?;
        let results = parse_names(&reply)?;
        if results.len() != expected {
            return Err(CollaboratorError::CountMismatch {
                expected,
                actual: results.len(),
            });
        }
        Ok(results)
    }
}

#[async_trait]
impl Namer for OracleNamer {
    async fn assign_names(&self, requests: &[NamingRequest]) -> Result<Vec<NamingResult>, CollaboratorError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let payload = serde_json::to_string(requests).map_err(|e| CollaboratorError::InvocationFailed(e.to_string()))?;
        self.ask(VARIABLE_PROMPT, payload, requests.len()).await
    }

    async fn name_requests(&self, requests: &[RequestNameRequest]) -> Result<Vec<String>, CollaboratorError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let payload = serde_json::to_string(requests).map_err(|e| CollaboratorError::InvocationFailed(e.to_string()))?;
        let results = self.ask(REQUEST_PROMPT, payload, requests.len()).await?;
        Ok(results.into_iter().map(|r| r.name).collect())
    }
}

/// Parse a reply into names: an array of strings or `{name, init_script}` objects.
fn parse_names(reply: &str) -> Result<Vec<NamingResult>, CollaboratorError> {
    let parsed = parse_reply(reply).ok_or_else(|| CollaboratorError::ParseError("no JSON in reply".to_string()))?;

    // Some models wrap the list: {"names": [...]}
    let entries = match parsed {
        Value::Array(entries) => entries,
        Value::Object(map) => match map.into_iter().find_map(|(_, v)| match v {
            Value::Array(entries) => Some(entries),
            _ => None,
        }) {
            Some(entries) => entries,
            None => return Err(CollaboratorError::ParseError("reply object holds no list".to_string())),
        },
        _ => return Err(CollaboratorError::ParseError("reply is not a list".to_string())),
    };

    entries
        .into_iter()
        .map(|entry| match entry {
            Value::String(name) if !name.trim().is_empty() => Ok(NamingResult::named(name)),
            Value::Object(map) => {
                let name = map
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|n| !n.trim().is_empty())
                    .ok_or_else(|| CollaboratorError::ParseError("entry without a name".to_string()))?;
                let init_script = map
                    .get("init_script")
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string);
                Ok(NamingResult {
                    name: name.to_string(),
                    init_script,
                })
            }
            other => Err(CollaboratorError::ParseError(format!("unexpected entry {}", other))),
        })
        .collect()
}

/// Offline naming: the proposed name, else `var{n}` by position.
///
/// Items are named `"{METHOD} {path}"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialNamer;

impl SequentialNamer {
    pub fn variable_names(requests: &[NamingRequest]) -> Vec<NamingResult> {
        requests
            .iter()
            .enumerate()
            .map(|(i, r)| match &r.proposed_name {
                Some(name) if !name.trim().is_empty() => NamingResult::named(name.clone()),
                _ => NamingResult::named(format!("var{}", i + 1)),
            })
            .collect()
    }

    pub fn item_names(requests: &[RequestNameRequest]) -> Vec<String> {
        requests
            .iter()
            .map(|r| {
                let path = url::Url::parse(&r.url)
                    .map(|u| u.path().to_string())
                    .unwrap_or_else(|_| r.url.clone());
                format!("{} {}", r.method.to_ascii_uppercase(), path)
            })
            .collect()
    }
}

#[async_trait]
impl Namer for SequentialNamer {
    async fn assign_names(&self, requests: &[NamingRequest]) -> Result<Vec<NamingResult>, CollaboratorError> {
        Ok(Self::variable_names(requests))
    }

    async fn name_requests(&self, requests: &[RequestNameRequest]) -> Result<Vec<String>, CollaboratorError> {
        Ok(Self::item_names(requests))
    }
}

/// Turn an arbitrary name into a script-safe identifier.
///
/// Runs of other characters collapse to `_`; a leading digit gets a `_`
/// prefix. Empty input yields `var`.
pub fn sanitize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        return "var".to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Sanitize names and make them unique, keeping names in `reserved` intact.
///
/// Later duplicates get `_2`, `_3`, ... suffixes.
pub fn unique_names(names: Vec<String>, reserved: &HashSet<String>) -> Vec<String> {
    let mut taken: HashSet<String> = reserved.clone();
    names
        .into_iter()
        .map(|name| {
            let base = sanitize_identifier(&name);
            let mut candidate = base.clone();
            let mut n = 2;
            while taken.contains(&candidate) {
                candidate = format!("{}_{}", base, n);
                n += 1;
            }
            taken.insert(candidate.clone());
            candidate
        })
        .collect()
}
