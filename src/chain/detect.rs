//! Chain detection
//!
//! Groups interesting values by canonical literal and keeps only groups
//! where a response produced the value before any request consumed it.
//!
//! Each group is scanned in capture order by a two-state automaton:
//!
//! ```text
//!   ResponseNotYetSeen --response--> ResponseSeen
//!   ResponseNotYetSeen --request---> discard group
//!   ResponseSeen       --request---> mark consumed
//!   ResponseSeen       --response--> ResponseSeen
//! ```
//!
//! A group is accepted when the scan ends in `ResponseSeen` having seen at
//! least one consuming request.

use super::{Chain, ChainId, ChainSource};
use crate::extract::{Direction, InterestFilter, ValueArena, ValueId};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    ResponseNotYetSeen,
    ResponseSeen { origin: ValueId, consumed: bool },
}

/// Result of scanning one same-valued group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A request used the value before any response produced it
    Uncaused,
    /// Produced by a response but never consumed afterwards
    Unconsumed,
    /// Produced, then consumed
    Chained { origin: ValueId },
}

/// Run the causal scan over a group's members, which must be in capture order.
pub fn scan_group(arena: &ValueArena, members: &[ValueId]) -> ScanOutcome {
    let mut state = ScanState::ResponseNotYetSeen;
    for &id in members {
        let Some(value) = arena.get(id) else { continue };
        state = match (state, value.direction) {
            (ScanState::ResponseNotYetSeen, Direction::Request) => return ScanOutcome::Uncaused,
            (ScanState::ResponseNotYetSeen, Direction::Response) => ScanState::ResponseSeen {
                origin: id,
                consumed: false,
            },
            (ScanState::ResponseSeen { origin, .. }, Direction::Request) => ScanState::ResponseSeen {
                origin,
                consumed: true,
            },
            (seen @ ScanState::ResponseSeen { .. }, Direction::Response) => seen,
        };
    }
    match state {
        ScanState::ResponseSeen {
            origin,
            consumed: true,
        } => ScanOutcome::Chained { origin },
        ScanState::ResponseSeen { .. } => ScanOutcome::Unconsumed,
        ScanState::ResponseNotYetSeen => ScanOutcome::Unconsumed,
    }
}

/// Finds causally chained values across a capture.
#[derive(Debug, Clone, Default)]
pub struct ChainDetector {
    filter: InterestFilter,
}

impl ChainDetector {
    pub fn new(filter: InterestFilter) -> Self {
        Self { filter }
    }

    /// Group interesting values by literal, in order of first occurrence.
    fn group(&self, arena: &ValueArena) -> Vec<(String, Vec<ValueId>)> {
        let mut groups: Vec<(String, Vec<ValueId>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for value in arena.iter().filter(|v| self.filter.is_interesting(v)) {
            let literal = value.value.canonical();
            match index.get(&literal) {
                Some(&slot) => groups[slot].1.push(value.id),
                None => {
                    index.insert(literal.clone(), groups.len());
                    groups.push((literal, vec![value.id]));
                }
            }
        }
        groups
    }

    /// Detect chains. Ids are assigned in order of first occurrence.
    pub fn detect(&self, arena: &ValueArena) -> Vec<Chain> {
        let mut chains = Vec::new();
        let mut uncaused = 0usize;

        for (literal, members) in self.group(arena) {
            if members.len() < 2 {
                continue;
            }
            match scan_group(arena, &members) {
                ScanOutcome::Chained { origin } => {
                    tracing::debug!(value = %literal, usages = members.len(), "chained value");
                    chains.push(Chain {
                        id: ChainId::new(chains.len()),
                        value: literal,
                        usages: members,
                        origin: Some(origin),
                        name: None,
                        source: ChainSource::Detected,
                        init_script: None,
                    });
                }
                ScanOutcome::Uncaused => {
                    uncaused += 1;
                    tracing::trace!(value = %literal, "shared value used before any response produced it");
                }
                ScanOutcome::Unconsumed => {}
            }
        }

        tracing::info!(chains = chains.len(), uncaused, "detected chains");
        chains
    }
}
