//! Replay-side JavaScript for extraction instructions

use crate::assemble::{ExtractionInstruction, ExtractionSource};
use crate::locator::{JsonPath, PathStep, PredicateValue};

fn is_js_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}

fn js_string(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

fn member(base: &str, key: &str) -> String {
    if is_js_identifier(key) {
        format!("{}.{}", base, key)
    } else {
        format!("{}[{}]", base, js_string(key))
    }
}

/// Render a locator path as a JavaScript expression rooted at `base`.
///
/// Predicates become `Array.prototype.find` calls.
pub fn js_accessor(base: &str, path: &JsonPath) -> String {
    let mut expr = base.to_string();
    for step in path.steps() {
        expr = match step {
            PathStep::Key(key) => member(&expr, key),
            PathStep::Index(index) => format!("{}[{}]", expr, index),
            PathStep::Where { field, equals } => {
                let literal = match equals {
                    PredicateValue::Text(text) => js_string(text),
                    PredicateValue::Number(n) => n.to_string(),
                };
                format!("{}.find(e => e && {} === {})", expr, member("e", field), literal)
            }
        };
    }
    expr
}

/// Lines of one guarded extraction block. A failure inside it only skips
/// this variable.
pub fn extraction_lines(instruction: &ExtractionInstruction) -> Vec<String> {
    let name = js_string(&instruction.variable);
    let mut lines = vec!["try {".to_string()];
    match &instruction.source {
        ExtractionSource::Body(path) => {
            lines.push("  const responseJson = pm.response.json();".to_string());
            lines.push(format!("  const value = {};", js_accessor("responseJson", path)));
        }
        ExtractionSource::Header(header) => {
            lines.push(format!("  const value = pm.response.headers.get({});", js_string(header)));
        }
    }
    lines.push(format!(
        "  if (value === undefined) {{ throw new Error({}); }}",
        js_string(&format!("{} not found at {}", instruction.variable, instruction.source))
    ));
    lines.push(format!("  pm.collectionVariables.set({}, value);", name));
    lines.push(format!("  console.log({}, value);", js_string(&format!("Variable {}:", instruction.variable))));
    lines.push("} catch (e) {".to_string());
    lines.push(format!(
        "  console.error({}, e);",
        js_string(&format!("Error extracting variable {}:", instruction.variable))
    ));
    lines.push("}".to_string());
    lines
}

/// The full test script for an item.
pub fn test_script(instructions: &[ExtractionInstruction]) -> Vec<String> {
    instructions.iter().flat_map(extraction_lines).collect()
}
