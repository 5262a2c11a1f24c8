//! Collaborators: naming and locator resolution
//!
//! Both capabilities sit behind narrow async traits so the pipeline never
//! depends on how they are reached. Each has an oracle-backed
//! implementation (an external text-in/text-out command) and a fully
//! offline one, which is also the fallback when the oracle fails.

mod naming;
mod oracle;
mod resolve;
mod retry;

pub use naming::{sanitize_identifier, unique_names, OracleNamer, SequentialNamer};
pub use oracle::{parse_reply, CommandOracle, MockOracle, TextOracle};
pub use resolve::{KeepPathResolver, OracleResolver, StructuralResolver};
pub use retry::with_retries;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors from collaborator calls. All of them are recoverable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator not available: {0}")]
    Unavailable(String),
    #[error("invocation failed: {0}")]
    InvocationFailed(String),
    #[error("reply parse error: {0}")]
    ParseError(String),
    #[error("expected {expected} results, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// One chain to be named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingRequest {
    /// URL of the request whose response originates the value
    pub origin_url: String,
    /// Locator of the origin usage
    pub origin_path: String,
    pub example_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_name: Option<String>,
}

/// Name assigned to one chain, positionally aligned with its request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_script: Option<String>,
}

impl NamingResult {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init_script: None,
        }
    }
}

/// One collection item to be named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestNameRequest {
    pub method: String,
    pub url: String,
    /// 1-based position in the capture
    pub sequence: usize,
}

/// Everything a resolver sees about one origin value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub url: String,
    pub current_path: String,
    pub value: String,
    /// Pruned neighborhood of the origin response body
    pub neighborhood: serde_json::Value,
    /// Path of the value inside `neighborhood`; array indices differ from
    /// `current_path` where skipped elements were collapsed
    #[serde(default)]
    pub neighborhood_path: String,
    /// Where later requests use the value
    #[serde(default)]
    pub usage_paths: Vec<String>,
}

/// Assigns variable names to chains and descriptive names to requests.
#[async_trait]
pub trait Namer: Send + Sync {
    /// Return exactly one result per request, in order.
    async fn assign_names(&self, requests: &[NamingRequest]) -> Result<Vec<NamingResult>, CollaboratorError>;

    /// Return exactly one item name per request, in order.
    async fn name_requests(&self, requests: &[RequestNameRequest]) -> Result<Vec<String>, CollaboratorError>;
}

/// Proposes a stable locator for an origin value.
#[async_trait]
pub trait LocatorResolver: Send + Sync {
    /// Return a revised path, or the current one when no revision is warranted.
    async fn resolve(&self, request: &ResolveRequest) -> Result<String, CollaboratorError>;
}
