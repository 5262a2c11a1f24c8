//! Format-neutral collection model handed to a `CollectionWriter`

use crate::capture::{Body, Header, InteractionId};
use crate::chain::ChainId;
use crate::locator::JsonPath;

/// A parameterized replay collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub name: String,
    /// One item per interaction, in capture order
    pub items: Vec<CollectionItem>,
    /// One variable per chain
    pub variables: Vec<CollectionVariable>,
    /// Scripts run once before the first request
    pub prerequest: Vec<String>,
}

impl Collection {
    pub fn variable(&self, name: &str) -> Option<&CollectionVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Total number of extraction instructions across items.
    pub fn extraction_count(&self) -> usize {
        self.items.iter().map(|i| i.extractions.len()).sum()
    }
}

/// One rewritten request and what to capture from its response.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionItem {
    pub name: String,
    pub interaction: InteractionId,
    pub request: RewrittenRequest,
    pub extractions: Vec<ExtractionInstruction>,
}

/// A request with chain literals replaced by placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct RewrittenRequest {
    pub method: String,
    pub url: RewrittenUrl,
    pub headers: Vec<Header>,
    pub body: Option<Body>,
}

/// A URL broken into its replayable parts, each already rewritten.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RewrittenUrl {
    pub raw: String,
    /// Empty when the recorded URL did not parse
    pub protocol: String,
    pub host: Vec<String>,
    pub path: Vec<String>,
    pub query: Vec<QueryPair>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPair {
    pub key: String,
    pub value: String,
}

/// Capture one variable from a response at replay time.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionInstruction {
    pub variable: String,
    pub chain: ChainId,
    pub source: ExtractionSource,
}

/// Where in the response the value is read from.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionSource {
    /// JSON body at a path
    Body(JsonPath),
    /// Response header, by name
    Header(String),
}

impl std::fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Body(path) => write!(f, "body {}", path),
            Self::Header(name) => write!(f, "header {}", name),
        }
    }
}

/// A declared collection variable.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionVariable {
    pub name: String,
    /// Recorded literal, used until a response overwrites it
    pub value: String,
    /// Where the value originates, for documentation
    pub description: Option<String>,
}
