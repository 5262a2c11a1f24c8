//! harchain: HTTP captures to parameterized replay collections
//!
//! Given an ordered capture of request/response pairs, harchain finds the
//! values a response produced and later requests consumed, names them,
//! rewrites every occurrence as a `{{name}}` placeholder, and emits the
//! per-response extraction a replay engine needs to capture each value
//! live instead of replaying the recorded literal.
//!
//! # Stages
//!
//! - **extract**: flatten each interaction into located values
//! - **detect**: keep values a response produced before a request used them
//! - **stabilize**: make origin locators robust to array reordering
//! - **name**: assign variable names (oracle-backed or sequential)
//! - **assemble**: substitute placeholders, build extraction instructions
//!
//! # Example
//!
//! ```
//! use harchain::{Body, Interaction, InteractionId, Pipeline, Request, Response};
//!
//! let capture = vec![
//!     Interaction::new(
//!         InteractionId::new(0),
//!         Request::new("POST", "https://api.example.com/login"),
//!         Response::new(200).with_body(Body::json(r#"{"token":"abc123"}"#)),
//!     ),
//!     Interaction::new(
//!         InteractionId::new(1),
//!         Request::new("GET", "https://api.example.com/me").with_header("Authorization", "Bearer abc123"),
//!         Response::new(200),
//!     ),
//! ];
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let assembly = runtime.block_on(Pipeline::default().run(capture, &[]));
//! assert_eq!(assembly.chains.len(), 1);
//! assert_eq!(assembly.collection.items[1].request.headers[0].value, "Bearer {{var1}}");
//! ```

pub mod assemble;
pub mod capture;
pub mod chain;
pub mod collaborator;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod locator;
pub mod output;
pub mod pipeline;
pub mod stabilize;

pub use assemble::{Assembler, Collection, CollectionItem, ExtractionInstruction, ExtractionSource, Substituter};
pub use capture::{decode_har, read_har, Body, Header, Interaction, InteractionId, Request, Response};
pub use chain::{Chain, ChainDetector, ChainId, ChainSource, DeclaredVariable};
pub use collaborator::{CollaboratorError, LocatorResolver, Namer, TextOracle};
pub use config::{PipelineConfig, StabilizerMode};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Stage};
pub use error::{HarchainError, Result};
pub use extract::{Direction, ExtractedValue, Extractor, InterestFilter, LiteralValue, Locator, ValueArena, ValueId};
pub use locator::JsonPath;
pub use output::{CollectionWriter, PostmanWriter};
pub use pipeline::{Assembly, Pipeline};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
