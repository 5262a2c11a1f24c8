//! JSON locator paths
//!
//! A path is a list of steps: object keys, array indices, and array
//! predicates that pick the first element whose field equals a literal.
//!
//! Canonical text form:
//! - identifier-safe keys are dotted: `data.items`
//! - other keys use the quoted bracket form: `['content-type']`, `['a.b']`
//! - indices: `[3]`
//! - predicates: `[?(@.type=='hotel')]`, `[?(@.code==42)]`
//!
//! The parser also accepts a leading `$` and double-quoted keys, which is
//! what resolvers tend to hand back.

use serde_json::{Number, Value};
use thiserror::Error;

/// Literal compared against an element field by a predicate step.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateValue {
    Text(String),
    Number(Number),
}

impl PredicateValue {
    /// Build a predicate literal from a scalar JSON value.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Number(n) => Some(Self::Number(n.clone())),
            _ => None,
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Text(expected), Value::String(actual)) => expected == actual,
            (Self::Number(expected), Value::Number(actual)) => {
                match (expected.as_f64(), actual.as_f64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

/// One step of a locator path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    Key(String),
    Index(usize),
    /// First array element that is an object whose `field` equals `equals`
    Where { field: String, equals: PredicateValue },
}

/// Errors from parsing a locator path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("unexpected character {found:?} at offset {offset} in path {path:?}")]
    Unexpected {
        path: String,
        offset: usize,
        found: char,
    },
    #[error("unexpected end of path {0:?}")]
    UnexpectedEnd(String),
    #[error("empty key in path {0:?}")]
    EmptyKey(String),
    #[error("invalid array index {index:?} in path {path:?}")]
    InvalidIndex { path: String, index: String },
    #[error("invalid predicate literal {literal:?} in path {path:?}")]
    InvalidLiteral { path: String, literal: String },
}

/// A structural address inside a JSON document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonPath {
    steps: Vec<PathStep>,
}

impl JsonPath {
    /// The empty path, denoting the document root.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn child_key(&self, key: impl Into<String>) -> Self {
        let mut steps = self.steps.clone();
        steps.push(PathStep::Key(key.into()));
        Self { steps }
    }

    pub fn child_index(&self, index: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push(PathStep::Index(index));
        Self { steps }
    }

    /// Resolve the path against a document.
    pub fn evaluate<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for step in &self.steps {
            current = step_into(current, step)?;
        }
        Some(current)
    }

    /// Parse a path from its text form.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        Parser::new(text).parse()
    }
}

/// Follow a single step from `value`.
pub(crate) fn step_into<'a>(value: &'a Value, step: &PathStep) -> Option<&'a Value> {
    match step {
        PathStep::Key(key) => value.as_object()?.get(key),
        PathStep::Index(index) => value.as_array()?.get(*index),
        PathStep::Where { field, equals } => value
            .as_array()?
            .iter()
            .find(|el| el.get(field).is_some_and(|v| equals.matches(v))),
    }
}

/// Position of the element a step selects inside an array.
pub(crate) fn selected_index(array: &[Value], step: &PathStep) -> Option<usize> {
    match step {
        PathStep::Index(index) if *index < array.len() => Some(*index),
        PathStep::Where { field, equals } => array
            .iter()
            .position(|el| el.get(field).is_some_and(|v| equals.matches(v))),
        _ => None,
    }
}

fn is_identifier(key: &str) -> bool {
    match key.chars().next() {
        Some(c) if !(c.is_ascii_alphabetic() || c == '_' || c == '@') => false,
        Some(_) => key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '@' | '-')),
        None => false,
    }
}

fn write_quoted(f: &mut std::fmt::Formatter<'_>, text: &str) -> std::fmt::Result {
    f.write_str("'")?;
    for c in text.chars() {
        if c == '\'' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    f.write_str("'")
}

impl std::fmt::Display for JsonPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                PathStep::Key(key) if is_identifier(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathStep::Key(key) => {
                    f.write_str("[")?;
                    write_quoted(f, key)?;
                    f.write_str("]")?;
                }
                PathStep::Index(index) => write!(f, "[{}]", index)?,
                PathStep::Where { field, equals } => {
                    f.write_str("[?(@")?;
                    if is_identifier(field) {
                        write!(f, ".{}", field)?;
                    } else {
                        f.write_str("[")?;
                        write_quoted(f, field)?;
                        f.write_str("]")?;
                    }
                    f.write_str("==")?;
                    match equals {
                        PredicateValue::Text(text) => write_quoted(f, text)?,
                        PredicateValue::Number(n) => write!(f, "{}", n)?,
                    }
                    f.write_str(")]")?;
                }
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for JsonPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        let text = text.trim();
        Self {
            text,
            chars: text.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map(|(o, _)| *o).unwrap_or(self.text.len())
    }

    fn unexpected(&self, found: char) -> PathError {
        PathError::Unexpected {
            path: self.text.to_string(),
            offset: self.offset(),
            found,
        }
    }

    fn end(&self) -> PathError {
        PathError::UnexpectedEnd(self.text.to_string())
    }

    fn expect(&mut self, expected: char) -> Result<(), PathError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.unexpected(c))
            }
            None => Err(self.end()),
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(|c| c == ' ') {
            self.pos += 1;
        }
    }

    fn parse(mut self) -> Result<JsonPath, PathError> {
        let mut steps = Vec::new();

        if self.peek() == Some('$') {
            let next = self.chars.get(self.pos + 1).map(|(_, c)| *c);
            if matches!(next, None | Some('.') | Some('[')) {
                self.pos += 1;
            }
        }

        let mut first = true;
        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    steps.push(PathStep::Key(self.identifier()?));
                }
                '[' => {
                    self.pos += 1;
                    steps.push(self.bracket()?);
                }
                _ if first && steps.is_empty() => {
                    steps.push(PathStep::Key(self.identifier()?));
                }
                other => return Err(self.unexpected(other)),
            }
            first = false;
        }

        Ok(JsonPath { steps })
    }

    fn identifier(&mut self) -> Result<String, PathError> {
        let mut key = String::new();
        while let Some(c) = self.peek() {
            if c == '.' || c == '[' {
                break;
            }
            key.push(c);
            self.pos += 1;
        }
        if key.is_empty() {
            return Err(PathError::EmptyKey(self.text.to_string()));
        }
        Ok(key)
    }

    fn quoted(&mut self) -> Result<String, PathError> {
        let quote = self.bump().ok_or_else(|| self.end())?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(self.end()),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(self.end()),
            }
        }
    }

    /// Parse the inside of `[...]`, the opening bracket already consumed.
    fn bracket(&mut self) -> Result<PathStep, PathError> {
        self.skip_spaces();
        let step = match self.peek() {
            Some('\'') | Some('"') => PathStep::Key(self.quoted()?),
            Some('?') => self.predicate()?,
            Some(c) if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
                    digits.push(c);
                    self.pos += 1;
                }
                let index = digits.parse().map_err(|_| PathError::InvalidIndex {
                    path: self.text.to_string(),
                    index: digits.clone(),
                })?;
                PathStep::Index(index)
            }
            Some(c) => return Err(self.unexpected(c)),
            None => return Err(self.end()),
        };
        self.skip_spaces();
        self.expect(']')?;
        Ok(step)
    }

    /// Parse `?(@.field==literal)`.
    fn predicate(&mut self) -> Result<PathStep, PathError> {
        self.expect('?')?;
        self.expect('(')?;
        self.skip_spaces();
        self.expect('@')?;
        let field = match self.peek() {
            Some('.') => {
                self.pos += 1;
                let mut field = String::new();
                while let Some(c) = self.peek() {
                    if c == '=' || c == ' ' || c == ')' {
                        break;
                    }
                    field.push(c);
                    self.pos += 1;
                }
                if field.is_empty() {
                    return Err(PathError::EmptyKey(self.text.to_string()));
                }
                field
            }
            Some('[') => {
                self.pos += 1;
                let field = self.quoted()?;
                self.expect(']')?;
                field
            }
            Some(c) => return Err(self.unexpected(c)),
            None => return Err(self.end()),
        };
        self.skip_spaces();
        self.expect('=')?;
        self.expect('=')?;
        self.skip_spaces();
        let equals = match self.peek() {
            Some('\'') | Some('"') => PredicateValue::Text(self.quoted()?),
            Some(_) => {
                let mut literal = String::new();
                while let Some(c) = self.peek() {
                    if c == ')' || c == ' ' {
                        break;
                    }
                    literal.push(c);
                    self.pos += 1;
                }
                match serde_json::from_str::<Value>(&literal) {
                    Ok(Value::Number(n)) => PredicateValue::Number(n),
                    _ => {
                        return Err(PathError::InvalidLiteral {
                            path: self.text.to_string(),
                            literal,
                        })
                    }
                }
            }
            None => return Err(self.end()),
        };
        self.skip_spaces();
        self.expect(')')?;
        Ok(PathStep::Where { field, equals })
    }
}
