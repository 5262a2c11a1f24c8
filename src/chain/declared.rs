//! Externally declared variables
//!
//! A declaration names a literal up front. Its usages are every
//! request-side value equal to that literal; there is no origin and no
//! causal test.

use super::{Chain, ChainId, ChainSource};
use crate::error::{HarchainError, Result};
use crate::extract::ValueArena;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A caller-supplied `{name, value, initializer}` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredVariable {
    pub name: String,
    #[serde(alias = "value")]
    pub search_value: String,
    /// Script run before the collection to (re)compute the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<String>,
}

impl DeclaredVariable {
    pub fn new(name: impl Into<String>, search_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            search_value: search_value.into(),
            initializer: None,
        }
    }

    pub fn with_initializer(mut self, script: impl Into<String>) -> Self {
        self.initializer = Some(script.into());
        self
    }
}

/// Parse a JSON or YAML list of declarations.
pub fn parse_declarations(text: &str) -> Result<Vec<DeclaredVariable>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(text).map_err(|e| HarchainError::Declarations(e.to_string()))
}

pub fn load_declarations(path: &Path) -> Result<Vec<DeclaredVariable>> {
    let text = std::fs::read_to_string(path).map_err(|e| HarchainError::io(path, e))?;
    parse_declarations(&text)
}

/// Build declared chains against the extracted values.
///
/// Ids are provisional; `merge_chains` renumbers them.
pub fn declare_chains(declared: &[DeclaredVariable], arena: &ValueArena) -> Vec<Chain> {
    let mut chains = Vec::new();
    for variable in declared {
        if variable.search_value.is_empty() {
            tracing::debug!(name = %variable.name, "skipping declaration with empty value");
            continue;
        }
        let usages: Vec<_> = arena
            .iter()
            .filter(|v| v.is_request() && v.value.as_str() == Some(variable.search_value.as_str()))
            .map(|v| v.id)
            .collect();
        if usages.is_empty() {
            tracing::debug!(name = %variable.name, "declared value never appears in a request");
            continue;
        }
        chains.push(Chain {
            id: ChainId::new(chains.len()),
            value: variable.search_value.clone(),
            usages,
            origin: None,
            name: Some(variable.name.clone()),
            source: ChainSource::Declared {
                initializer: variable.initializer.clone(),
            },
            init_script: None,
        });
    }
    chains
}
