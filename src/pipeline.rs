//! Stage orchestration
//!
//! extract → detect → declare → stabilize → name → assemble
//!
//! `run` never fails. Every recovery along the way lands in the returned
//! `Diagnostics`; writing the collection is left to the caller.

use crate::assemble::{Assembler, Collection};
use crate::capture::{Interaction, InteractionId};
use crate::chain::{declare_chains, link_chains, merge_chains, Chain, ChainDetector, DeclaredVariable};
use crate::collaborator::{
    unique_names, with_retries, CommandOracle, KeepPathResolver, LocatorResolver, Namer, NamingRequest,
    OracleNamer, OracleResolver, RequestNameRequest, SequentialNamer, StructuralResolver, TextOracle,
};
use crate::config::{PipelineConfig, StabilizerMode};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Stage};
use crate::extract::{Extractor, InterestFilter, ValueArena};
use crate::stabilize::Stabilizer;
use std::collections::HashSet;
use std::sync::Arc;

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub collection: Collection,
    pub chains: Vec<Chain>,
    pub values: ValueArena,
    pub interactions: Vec<Interaction>,
    pub diagnostics: Diagnostics,
}

impl Assembly {
    pub fn chain_for_value(&self, value: &str) -> Option<&Chain> {
        self.chains.iter().find(|c| c.value == value)
    }
}

/// The configured pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    namer: Arc<dyn Namer>,
    resolver: Arc<dyn LocatorResolver>,
}

impl Pipeline {
    /// Offline pipeline: sequential naming and the resolver the mode calls for.
    pub fn new(config: PipelineConfig) -> Self {
        let resolver: Arc<dyn LocatorResolver> = match config.stabilizer.mode {
            StabilizerMode::Keep => Arc::new(KeepPathResolver),
            StabilizerMode::Structural | StabilizerMode::Oracle => Arc::new(StructuralResolver),
        };
        Self {
            config,
            namer: Arc::new(SequentialNamer),
            resolver,
        }
    }

    /// Pipeline wired from configuration: oracle-backed collaborators when
    /// an oracle command is configured.
    pub fn from_config(config: PipelineConfig) -> Self {
        let oracle = CommandOracle::new(&config.collaborators.command);
        let mode = config.stabilizer.mode;
        let mut pipeline = Self::new(config);
        match oracle {
            Some(oracle) => {
                let oracle: Arc<dyn TextOracle> = Arc::new(oracle);
                pipeline = pipeline.with_namer(Arc::new(OracleNamer::new(oracle.clone())));
                if mode == StabilizerMode::Oracle {
                    pipeline = pipeline.with_resolver(Arc::new(OracleResolver::new(oracle)));
                }
            }
            None if mode == StabilizerMode::Oracle => {
                tracing::warn!("oracle stabilization requested without an oracle command, using structural");
            }
            None => {}
        }
        pipeline
    }

    pub fn with_namer(mut self, namer: Arc<dyn Namer>) -> Self {
        self.namer = namer;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn LocatorResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over a capture, in capture order.
    pub async fn run(&self, mut interactions: Vec<Interaction>, declared: &[DeclaredVariable]) -> Assembly {
        for (i, interaction) in interactions.iter_mut().enumerate() {
            interaction.id = InteractionId::new(i);
        }
        let mut diagnostics = Diagnostics::new();

        let mut arena = Extractor::new(&self.config.extract).extract_all(&interactions, &mut diagnostics);

        let detected = ChainDetector::new(InterestFilter::new(self.config.filter.clone())).detect(&arena);
        let declared = declare_chains(declared, &arena);
        let mut chains = merge_chains(detected, declared, &mut diagnostics);
        link_chains(&chains, &mut arena);

        if self.config.stabilizer.mode != StabilizerMode::Keep {
            Stabilizer::new(self.resolver.clone(), &self.config.stabilizer)
                .with_attempts(self.config.collaborators.attempts)
                .stabilize_all(&chains, &mut arena, &interactions, &mut diagnostics)
                .await;
        }

        self.name_chains(&mut chains, &arena, &interactions, &mut diagnostics).await;
        let item_names = self.name_items(&interactions, &mut diagnostics).await;

        let collection = Assembler::new(&self.config.output).assemble(
            &interactions,
            &arena,
            &chains,
            &item_names,
            &mut diagnostics,
        );

        tracing::info!(
            interactions = interactions.len(),
            chains = chains.len(),
            diagnostics = diagnostics.len(),
            "pipeline finished"
        );
        Assembly {
            collection,
            chains,
            values: arena,
            interactions,
            diagnostics,
        }
    }

    /// Name every chain that has no name yet. Declared names are kept.
    async fn name_chains(
        &self,
        chains: &mut [Chain],
        arena: &ValueArena,
        interactions: &[Interaction],
        diagnostics: &mut Diagnostics,
    ) {
        let pending: Vec<usize> = chains
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name.is_none())
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return;
        }

        let requests: Vec<NamingRequest> = pending
            .iter()
            .map(|&i| {
                let chain = &chains[i];
                let origin = chain.origin.and_then(|id| arena.get(id));
                NamingRequest {
                    origin_url: origin
                        .and_then(|o| interactions.get(o.interaction.index()))
                        .map(|interaction| interaction.request.url.clone())
                        .unwrap_or_default(),
                    origin_path: origin.map(|o| o.locator.to_string()).unwrap_or_default(),
                    example_value: chain.value.clone(),
                    hint: None,
                    proposed_name: None,
                }
            })
            .collect();

        let expected = requests.len();
        let outcome = with_retries(
            self.config.collaborators.attempts,
            || self.namer.assign_names(&requests),
            |r| r.as_ref().map_or(true, |names| names.len() != expected),
        )
        .await;

        let results = match outcome {
            Ok(names) if names.len() == expected => names,
            Ok(names) => {
                diagnostics.record(Diagnostic::new(
                    Stage::Name,
                    DiagnosticKind::CollaboratorFailure,
                    format!(
                        "namer returned {} names for {} chains, using default names",
                        names.len(),
                        expected
                    ),
                ));
                SequentialNamer::variable_names(&requests)
            }
            Err(e) => {
                diagnostics.record(Diagnostic::new(
                    Stage::Name,
                    DiagnosticKind::CollaboratorFailure,
                    format!("{}, using default names", e),
                ));
                SequentialNamer::variable_names(&requests)
            }
        };

        let reserved: HashSet<String> = chains.iter().filter_map(|c| c.name.clone()).collect();
        let (names, scripts): (Vec<String>, Vec<Option<String>>) =
            results.into_iter().map(|r| (r.name, r.init_script)).unzip();

        for ((&i, name), script) in pending.iter().zip(unique_names(names, &reserved)).zip(scripts) {
            tracing::debug!(value = %chains[i].value, name = %name, "named chain");
            chains[i].name = Some(name);
            chains[i].init_script = script;
        }
    }

    /// Descriptive item names, positionally aligned with the interactions.
    async fn name_items(&self, interactions: &[Interaction], diagnostics: &mut Diagnostics) -> Vec<String> {
        let requests: Vec<RequestNameRequest> = interactions
            .iter()
            .enumerate()
            .map(|(i, interaction)| RequestNameRequest {
                method: interaction.request.method.clone(),
                url: interaction.request.url.clone(),
                sequence: i + 1,
            })
            .collect();
        if requests.is_empty() {
            return Vec::new();
        }

        let expected = requests.len();
        let outcome = with_retries(
            self.config.collaborators.attempts,
            || self.namer.name_requests(&requests),
            |r| r.as_ref().map_or(true, |names| names.len() != expected),
        )
        .await;

        match outcome {
            Ok(names) if names.len() == expected => names,
            Ok(names) => {
                diagnostics.record(Diagnostic::new(
                    Stage::Name,
                    DiagnosticKind::CollaboratorFailure,
                    format!("namer returned {} item names for {} requests", names.len(), expected),
                ));
                SequentialNamer::item_names(&requests)
            }
            Err(e) => {
                diagnostics.record(Diagnostic::new(
                    Stage::Name,
                    DiagnosticKind::CollaboratorFailure,
                    format!("item naming failed: {}", e),
                ));
                SequentialNamer::item_names(&requests)
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
