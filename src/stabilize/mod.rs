//! Locator stabilization
//!
//! For each chain whose origin sits in a JSON response body, derive a path
//! that keeps selecting the value in future, similar responses. The
//! resolver's candidate is only accepted if it parses and still resolves
//! to the recorded literal on the recorded response; anything else keeps
//! the recorded path.

mod prune;

pub use prune::{prune, PruneError, PruneLimits, Pruned};

use crate::capture::Interaction;
use crate::chain::Chain;
use crate::collaborator::{with_retries, LocatorResolver, ResolveRequest};
use crate::config::StabilizerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Stage};
use crate::extract::{LiteralValue, Locator, ValueArena};
use crate::locator::JsonPath;
use std::sync::Arc;

/// What happened to one origin locator.
#[derive(Debug, Clone, PartialEq)]
pub enum Stabilization {
    /// Replaced with a verified path
    Revised { from: JsonPath, to: JsonPath },
    /// Recorded path kept
    Kept,
}

/// Rewrites origin locators through a `LocatorResolver`.
pub struct Stabilizer {
    resolver: Arc<dyn LocatorResolver>,
    limits: PruneLimits,
    attempts: usize,
}

impl Stabilizer {
    pub fn new(resolver: Arc<dyn LocatorResolver>, config: &StabilizerConfig) -> Self {
        Self {
            resolver,
            limits: PruneLimits {
                descendant_depth: config.descendant_depth,
                max_siblings: config.max_siblings,
            },
            attempts: 1,
        }
    }

    /// Attempts per resolver call, including the first.
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    /// Stabilize every detected chain's origin. Returns the number revised.
    pub async fn stabilize_all(
        &self,
        chains: &[Chain],
        arena: &mut ValueArena,
        interactions: &[Interaction],
        diagnostics: &mut Diagnostics,
    ) -> usize {
        let mut revised = 0;
        for chain in chains {
            if let Stabilization::Revised { .. } = self.stabilize(chain, arena, interactions, diagnostics).await {
                revised += 1;
            }
        }
        tracing::info!(chains = chains.len(), revised, "stabilized origin locators");
        revised
    }

    /// Stabilize one chain's origin locator in place.
    pub async fn stabilize(
        &self,
        chain: &Chain,
        arena: &mut ValueArena,
        interactions: &[Interaction],
        diagnostics: &mut Diagnostics,
    ) -> Stabilization {
        let Some(origin_id) = chain.origin else {
            return Stabilization::Kept;
        };
        let Some(origin) = arena.get(origin_id) else {
            return Stabilization::Kept;
        };
        let Some(current) = origin.locator.body_path().cloned() else {
            return Stabilization::Kept;
        };
        let interaction_id = origin.interaction;
        let Some(interaction) = interactions.get(interaction_id.index()) else {
            return Stabilization::Kept;
        };

        let diagnostic = |kind, message: String| {
            Diagnostic::new(Stage::Stabilize, kind, message)
                .in_interaction(interaction_id)
                .with_value(current.to_string())
        };

        let doc = match serde_json::from_str::<serde_json::Value>(interaction.response.body_text()) {
            Ok(doc) => doc,
            Err(e) => {
                diagnostics.record(diagnostic(
                    DiagnosticKind::MalformedBody,
                    format!("origin response body no longer parses: {}", e),
                ));
                return Stabilization::Kept;
            }
        };

        let pruned = match prune(&doc, &current, self.limits) {
            Ok(pruned) => pruned,
            Err(e) => {
                diagnostics.record(diagnostic(DiagnosticKind::LocatorResolutionMismatch, e.to_string()));
                return Stabilization::Kept;
            }
        };

        let usage_paths = chain
            .usages
            .iter()
            .filter_map(|id| arena.get(*id))
            .filter(|v| v.is_request())
            .map(|v| v.locator.to_string())
            .collect();
        let request = ResolveRequest {
            url: interaction.request.url.clone(),
            current_path: current.to_string(),
            value: chain.value.clone(),
            neighborhood: pruned.document,
            neighborhood_path: pruned.path.to_string(),
            usage_paths,
        };

        let reply = with_retries(
            self.attempts,
            || self.resolver.resolve(&request),
            |r| r.as_ref().map_or(true, |p| p.trim().is_empty()),
        )
        .await;

        let candidate = match reply {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                diagnostics.record(diagnostic(
                    DiagnosticKind::CollaboratorFailure,
                    "resolver returned an empty path".to_string(),
                ));
                return Stabilization::Kept;
            }
            Err(e) => {
                diagnostics.record(diagnostic(DiagnosticKind::CollaboratorFailure, e.to_string()));
                return Stabilization::Kept;
            }
        };

        let revised = match JsonPath::parse(&candidate) {
            Ok(path) => path,
            Err(e) => {
                diagnostics.record(diagnostic(
                    DiagnosticKind::CollaboratorFailure,
                    format!("resolver returned an unusable path: {}", e),
                ));
                return Stabilization::Kept;
            }
        };

        if revised == current {
            return Stabilization::Kept;
        }

        let resolves_to_literal = revised
            .evaluate(&doc)
            .and_then(LiteralValue::from_json)
            .is_some_and(|v| v.canonical() == chain.value);
        if !resolves_to_literal {
            diagnostics.record(diagnostic(
                DiagnosticKind::LocatorResolutionMismatch,
                format!("proposed path {} does not select the recorded value", revised),
            ));
            return Stabilization::Kept;
        }

        tracing::debug!(from = %current, to = %revised, "revised origin locator");
        if let Some(origin) = arena.get_mut(origin_id) {
            origin.locator = Locator::Body(revised.clone());
        }
        Stabilization::Revised {
            from: current,
            to: revised,
        }
    }
}
