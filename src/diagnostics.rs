//! Structured diagnostics for recovered failures
//!
//! Every stage recovers locally and keeps going. What it recovered from is
//! recorded here (which stage, which interaction, which value) and mirrored
//! to `tracing` so the same event shows up in logs and in test assertions.

use crate::capture::InteractionId;

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Declare,
    Stabilize,
    Name,
    Assemble,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Extract => "extract",
            Self::Declare => "declare",
            Self::Stabilize => "stabilize",
            Self::Name => "name",
            Self::Assemble => "assemble",
        };
        f.write_str(s)
    }
}

/// What kind of recovery happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A body claimed a supported content type but did not parse
    MalformedBody,
    /// The request URL did not parse
    MalformedUrl,
    /// A recorded or proposed locator does not resolve against the response
    LocatorResolutionMismatch,
    /// A collaborator was unreachable, returned garbage, or a mismatched batch
    CollaboratorFailure,
    /// An origin value lives somewhere a replay script cannot read it from
    UnsupportedExtraction,
    /// A declared variable shadowed a detected chain with the same literal
    DeclarationConflict,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MalformedBody => "malformed body",
            Self::MalformedUrl => "malformed url",
            Self::LocatorResolutionMismatch => "locator resolution mismatch",
            Self::CollaboratorFailure => "collaborator failure",
            Self::UnsupportedExtraction => "unsupported extraction",
            Self::DeclarationConflict => "declaration conflict",
        };
        f.write_str(s)
    }
}

/// A single recovered failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub stage: Stage,
    pub kind: DiagnosticKind,
    /// Interaction the failure relates to, if any
    pub interaction: Option<InteractionId>,
    /// Literal value or locator involved, if any
    pub value: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(stage: Stage, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            interaction: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn in_interaction(mut self, id: InteractionId) -> Self {
        self.interaction = Some(id);
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.stage, self.kind)?;
        if let Some(id) = self.interaction {
            write!(f, " (interaction {})", id)?;
        }
        if let Some(value) = &self.value {
            write!(f, " ({:?})", value)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Ordered collection of diagnostics for one run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it.
    pub fn record(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(
            stage = %diagnostic.stage,
            kind = %diagnostic.kind,
            interaction = diagnostic.interaction.map(|id| id.index()),
            value = diagnostic.value.as_deref(),
            "{}",
            diagnostic.message
        );
        self.entries.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_filter_by_kind() {
        let mut diags = Diagnostics::new();
        diags.record(Diagnostic::new(
            Stage::Extract,
            DiagnosticKind::MalformedBody,
            "unexpected end of input",
        ));
        diags.record(
            Diagnostic::new(Stage::Name, DiagnosticKind::CollaboratorFailure, "timeout")
                .in_interaction(InteractionId::new(2)),
        );

        assert_eq!(diags.len(), 2);
        assert_eq!(diags.count_of(DiagnosticKind::MalformedBody), 1);
        assert_eq!(diags.count_of(DiagnosticKind::DeclarationConflict), 0);
        let failure = diags
            .of_kind(DiagnosticKind::CollaboratorFailure)
            .next()
            .unwrap();
        assert_eq!(failure.interaction, Some(InteractionId::new(2)));
    }

    #[test]
    fn display_includes_stage_and_value() {
        let d = Diagnostic::new(
            Stage::Stabilize,
            DiagnosticKind::LocatorResolutionMismatch,
            "index out of range",
        )
        .in_interaction(InteractionId::new(0))
        .with_value("items[4].id");

        assert_eq!(
            d.to_string(),
            "[stabilize] locator resolution mismatch (interaction 0) (\"items[4].id\"): index out of range"
        );
    }
}
