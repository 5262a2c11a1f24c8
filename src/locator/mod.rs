//! Locator paths: the structural addresses used to find values in JSON

mod flatten;
mod path;

pub use flatten::flatten;
pub use path::{JsonPath, PathError, PathStep, PredicateValue};
pub(crate) use path::{selected_index, step_into};
