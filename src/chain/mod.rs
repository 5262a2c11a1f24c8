//! Chains: values proven to flow from a response into later requests
//!
//! Chains are either detected from the capture or declared up front. Both
//! kinds live in one ordered list indexed by `ChainId`; extracted values
//! point back at their chain by id only.

mod declared;
mod detect;

pub use declared::{declare_chains, load_declarations, parse_declarations, DeclaredVariable};
pub use detect::{scan_group, ChainDetector, ScanOutcome};

use crate::capture::InteractionId;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Stage};
use crate::extract::{ValueArena, ValueId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Index of a chain in the run's chain list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainId(usize);

impl ChainId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a chain came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSource {
    /// Found by the causal scan
    Detected,
    /// Supplied by the caller, bypassing detection
    Declared { initializer: Option<String> },
}

/// One causally valid shared value.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub id: ChainId,
    /// Canonical literal
    pub value: String,
    /// Every usage, in capture order
    pub usages: Vec<ValueId>,
    /// First response-side usage; `None` only for declared chains
    pub origin: Option<ValueId>,
    /// Assigned variable name, set by the naming stage
    pub name: Option<String>,
    pub source: ChainSource,
    /// Initialization script returned by the naming collaborator
    pub init_script: Option<String>,
}

impl Chain {
    pub fn is_declared(&self) -> bool {
        matches!(self.source, ChainSource::Declared { .. })
    }

    /// Assigned name, or the positional default when naming has not run.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => default_name(self.id),
        }
    }

    /// Interaction whose response originates this chain.
    pub fn origin_interaction(&self, arena: &ValueArena) -> Option<InteractionId> {
        self.origin
            .and_then(|id| arena.get(id))
            .map(|value| value.interaction)
    }
}

/// Deterministic fallback name for a chain: `var1`, `var2`, ...
pub fn default_name(id: ChainId) -> String {
    format!("var{}", id.index() + 1)
}

/// Merge declared chains over detected ones and renumber.
///
/// A declared chain supersedes any detected chain with the same literal.
/// Detected chains come first, in detection order, followed by declared
/// chains in declaration order.
pub fn merge_chains(detected: Vec<Chain>, declared: Vec<Chain>, diagnostics: &mut Diagnostics) -> Vec<Chain> {
    let declared_values: HashSet<&str> = declared.iter().map(|c| c.value.as_str()).collect();

    let mut merged = Vec::with_capacity(detected.len() + declared.len());
    for chain in detected {
        if declared_values.contains(chain.value.as_str()) {
            diagnostics.record(
                Diagnostic::new(
                    Stage::Declare,
                    DiagnosticKind::DeclarationConflict,
                    "declared variable supersedes the detected chain with the same value",
                )
                .with_value(chain.value.clone()),
            );
            continue;
        }
        merged.push(chain);
    }
    merged.extend(declared.iter().cloned());

    for (i, chain) in merged.iter_mut().enumerate() {
        chain.id = ChainId::new(i);
    }
    merged
}

/// Point every usage in the arena back at its chain.
pub fn link_chains(chains: &[Chain], arena: &mut ValueArena) {
    for chain in chains {
        for &usage in &chain.usages {
            if let Some(value) = arena.get_mut(usage) {
                value.chain = Some(chain.id);
            }
        }
    }
}
