//! Interestingness filter
//!
//! A pure predicate that removes noise before chain detection: nulls,
//! booleans, type discriminators, content types, short strings and small
//! numbers (status codes, flags, counters) that would otherwise chain by
//! coincidence.

use super::value::{ExtractedValue, LiteralValue, Locator};
use crate::config::FilterConfig;

/// Decides whether an extracted value is worth chaining.
#[derive(Debug, Clone)]
pub struct InterestFilter {
    config: FilterConfig,
}

impl Default for InterestFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl InterestFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn is_interesting(&self, value: &ExtractedValue) -> bool {
        self.accepts(&value.value, &value.locator)
    }

    /// The predicate itself, over a literal and where it was found.
    pub fn accepts(&self, value: &LiteralValue, locator: &Locator) -> bool {
        if value.is_null() {
            return false;
        }

        if let Some(name) = locator.header_name() {
            if name.eq_ignore_ascii_case("content-type") {
                return false;
            }
        }

        let rendered = locator.to_string();
        if self
            .config
            .discriminator_markers
            .iter()
            .any(|marker| rendered.contains(marker.as_str()))
        {
            return false;
        }

        match value {
            LiteralValue::String(s) => s.chars().count() >= self.config.min_string_len,
            LiteralValue::Number(n) => n
                .as_f64()
                .is_some_and(|f| f.abs() >= self.config.min_number),
            LiteralValue::Bool(_) | LiteralValue::Null => false,
        }
    }
}
