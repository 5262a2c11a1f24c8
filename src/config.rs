//! Pipeline configuration
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Files are read with `serde_yaml`, which also accepts JSON.

use crate::error::{HarchainError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Headers dropped before chain analysis: connection management and
/// framework noise that never carries a chained value.
pub const DEFAULT_IGNORED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "content-length",
    "accept-encoding",
    "date",
    "server",
    "x-powered-by",
    "via",
    "vary",
    "x-aspnet-version",
    "x-aspnetmvc-version",
];

/// Thresholds for the interestingness filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Shortest string (in characters) worth chaining
    pub min_string_len: usize,
    /// Smallest magnitude a number must reach to be chained (inclusive)
    pub min_number: f64,
    /// Locator substrings that mark type discriminators rather than data
    pub discriminator_markers: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_string_len: 2,
            min_number: 100.0,
            discriminator_markers: vec!["@type".to_string()],
        }
    }
}

/// Extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Header names (case-insensitive) never extracted
    pub ignored_headers: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            ignored_headers: DEFAULT_IGNORED_HEADERS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

/// How origin locators are stabilized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StabilizerMode {
    /// Keep recorded paths as they are
    Keep,
    /// Offline: replace ambiguous indices with sibling-field predicates
    #[default]
    Structural,
    /// Ask the external oracle, verified against the recorded response
    Oracle,
}

/// Locator stabilization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    pub mode: StabilizerMode,
    /// Levels kept below the target value when pruning
    pub descendant_depth: usize,
    /// Array elements kept around the element on the path
    pub max_siblings: usize,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            mode: StabilizerMode::Structural,
            descendant_depth: 3,
            max_siblings: 20,
        }
    }
}

/// External collaborator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    /// Attempts per collaborator call, including the first
    pub attempts: usize,
    /// Command line of the text oracle (program followed by arguments)
    pub command: Vec<String>,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            command: Vec::new(),
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub collection_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            collection_name: "Generated Collection".to_string(),
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub filter: FilterConfig,
    pub extract: ExtractConfig,
    pub stabilizer: StabilizerConfig,
    pub collaborators: CollaboratorConfig,
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Parse a YAML or JSON configuration document.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| HarchainError::Config(e.to_string()))
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| HarchainError::io(path, e))?;
        Self::parse(&text)
    }

    /// Default config location (`<config dir>/harchain/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("harchain").join("config.yaml"))
    }

    /// Load from `path` if given, else from the default location if it
    /// exists, else fall back to defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(default) if default.is_file() => {
                tracing::debug!(path = %default.display(), "loading default config");
                Self::load(&default)
            }
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = PipelineConfig::parse("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.filter.min_string_len, 2);
        assert_eq!(config.collaborators.attempts, 3);
        assert_eq!(config.stabilizer.mode, StabilizerMode::Structural);
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let config = PipelineConfig::parse(
            "filter:\n  min_string_len: 4\n  min_number: 1000\nstabilizer:\n  mode: oracle\ncollaborators:\n  command: [llm, --json]\n",
        )
        .unwrap();
        assert_eq!(config.filter.min_string_len, 4);
        assert_eq!(config.filter.min_number, 1000.0);
        assert_eq!(config.filter.discriminator_markers, vec!["@type".to_string()]);
        assert_eq!(config.stabilizer.mode, StabilizerMode::Oracle);
        assert_eq!(config.stabilizer.descendant_depth, 3);
        assert_eq!(config.collaborators.command, vec!["llm", "--json"]);
        assert_eq!(config.collaborators.attempts, 3);
    }

    #[test]
    fn json_documents_are_accepted() {
        let config =
            PipelineConfig::parse(r#"{"output": {"collection_name": "Checkout flow"}}"#).unwrap();
        assert_eq!(config.output.collection_name, "Checkout flow");
    }

    #[test]
    fn invalid_documents_are_config_errors() {
        let err = PipelineConfig::parse("filter: [1, 2").unwrap_err();
        assert!(matches!(err, HarchainError::Config(_)));
    }

    #[test]
    fn explicit_missing_file_is_an_io_error() {
        let err = PipelineConfig::resolve(Some(Path::new("/nonexistent/harchain.yaml"))).unwrap_err();
        assert!(matches!(err, HarchainError::Io { .. }));
    }
}
