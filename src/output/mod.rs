//! Collection output
//!
//! The core hands over a fully substituted `Collection`; writers own the
//! on-disk format. A failed write is the one fatal error of a run.

mod postman;
mod script;

pub use postman::{to_postman, PostmanCollection, PostmanWriter, SCHEMA_URL};
pub use script::{extraction_lines, js_accessor, test_script};

use crate::assemble::Collection;
use crate::error::Result;

/// Persists an assembled collection.
pub trait CollectionWriter {
    fn write(&self, collection: &Collection) -> Result<()>;
}
