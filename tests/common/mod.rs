//! Shared builders for harchain integration tests
//!
//! Captures are built either directly as `Interaction`s or as HAR text,
//! and nested JSON documents are generated from a seeded RNG so property
//! checks are reproducible.

#![allow(dead_code)]

pub mod capture;
pub mod documents;

pub use capture::{CaptureBuilder, HarBuilder};
pub use documents::random_document;
