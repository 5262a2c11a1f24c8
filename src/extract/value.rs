//! Extracted values and the arena that owns them

use crate::capture::InteractionId;
use crate::chain::ChainId;
use crate::locator::JsonPath;
use serde_json::{Number, Value};

/// Index of an extracted value in its `ValueArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(usize);

impl ValueId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Which half of the interaction a value was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Response,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request => f.write_str("request"),
            Self::Response => f.write_str("response"),
        }
    }
}

/// A scalar value found in a request or response.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl LiteralValue {
    /// Convert a scalar JSON value. Objects and arrays are not literals.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Null => Some(Self::Null),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Canonical string form used for equality grouping and substitution.
    ///
    /// Strings are themselves. Numbers use the shortest form that parses
    /// back to the same JSON number (`1500`, `12.5`, `-3`). Booleans and
    /// null use their JSON spelling.
    pub fn canonical(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Null => "null".to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// Where inside an interaction a value was found.
#[derive(Debug, Clone, PartialEq)]
pub enum Locator {
    /// Leaf of a JSON body
    Body(JsonPath),
    /// Form-encoded body field; `index` counts repeats of the same key
    Form { key: String, index: usize },
    /// Header, by name as recorded
    Header(String),
    /// URL host
    Host,
    /// Non-empty URL path segment, by position
    PathSegment(usize),
    /// Query parameter value; `index` counts repeats of the same key
    Query { key: String, index: usize },
}

impl Locator {
    pub fn header_name(&self) -> Option<&str> {
        match self {
            Self::Header(name) => Some(name),
            _ => None,
        }
    }

    pub fn body_path(&self) -> Option<&JsonPath> {
        match self {
            Self::Body(path) => Some(path),
            _ => None,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Body(path) => write!(f, "{}", path),
            Self::Form { key, index } => write!(f, "{}[{}]", key, index),
            Self::Header(name) => f.write_str(name),
            Self::Host => f.write_str("host"),
            Self::PathSegment(i) => write!(f, "path[{}]", i),
            Self::Query { key, index } => write!(f, "query.{}[{}]", key, index),
        }
    }
}

/// One candidate value found inside an interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedValue {
    pub id: ValueId,
    pub interaction: InteractionId,
    pub direction: Direction,
    pub locator: Locator,
    pub value: LiteralValue,
    /// Chain this value belongs to, set after detection
    pub chain: Option<ChainId>,
}

impl ExtractedValue {
    pub fn is_request(&self) -> bool {
        self.direction == Direction::Request
    }

    pub fn is_response(&self) -> bool {
        self.direction == Direction::Response
    }
}

/// Owner of every extracted value in a run, in capture order.
///
/// Values are appended interaction by interaction (request side first),
/// so iteration order is the causal order chain detection scans in.
#[derive(Debug, Clone, Default)]
pub struct ValueArena {
    values: Vec<ExtractedValue>,
}

impl ValueArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        interaction: InteractionId,
        direction: Direction,
        locator: Locator,
        value: LiteralValue,
    ) -> ValueId {
        let id = ValueId(self.values.len());
        self.values.push(ExtractedValue {
            id,
            interaction,
            direction,
            locator,
            value,
            chain: None,
        });
        id
    }

    pub fn get(&self, id: ValueId) -> Option<&ExtractedValue> {
        self.values.get(id.0)
    }

    pub fn get_mut(&mut self, id: ValueId) -> Option<&mut ExtractedValue> {
        self.values.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractedValue> {
        self.values.iter()
    }

    /// Values found in one interaction, in extraction order.
    pub fn for_interaction(&self, id: InteractionId) -> impl Iterator<Item = &ExtractedValue> {
        self.values.iter().filter(move |v| v.interaction == id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_forms() {
        assert_eq!(LiteralValue::from("abc").canonical(), "abc");
        assert_eq!(LiteralValue::from_json(&json!(1500)).unwrap().canonical(), "1500");
        assert_eq!(LiteralValue::from_json(&json!(12.5)).unwrap().canonical(), "12.5");
        assert_eq!(LiteralValue::from_json(&json!(-3)).unwrap().canonical(), "-3");
        assert_eq!(LiteralValue::from_json(&json!(true)).unwrap().canonical(), "true");
        assert_eq!(LiteralValue::Null.canonical(), "null");
        assert!(LiteralValue::from_json(&json!({"a": 1})).is_none());
    }

    #[test]
    fn locator_display() {
        assert_eq!(
            Locator::Body(JsonPath::parse("a.b[0]").unwrap()).to_string(),
            "a.b[0]"
        );
        assert_eq!(
            Locator::Query {
                key: "page".to_string(),
                index: 1
            }
            .to_string(),
            "query.page[1]"
        );
        assert_eq!(Locator::PathSegment(2).to_string(), "path[2]");
        assert_eq!(
            Locator::Form {
                key: "user".to_string(),
                index: 0
            }
            .to_string(),
            "user[0]"
        );
        assert_eq!(Locator::Header("X-Token".to_string()).to_string(), "X-Token");
        assert_eq!(Locator::Host.to_string(), "host");
    }

    #[test]
    fn arena_ids_follow_insertion_order() {
        let mut arena = ValueArena::new();
        let a = arena.push(
            InteractionId::new(0),
            Direction::Response,
            Locator::Header("X-Id".to_string()),
            LiteralValue::from("one"),
        );
        let b = arena.push(
            InteractionId::new(1),
            Direction::Request,
            Locator::Host,
            LiteralValue::from("two"),
        );
        assert!(a < b);
        assert_eq!(arena.get(b).unwrap().value.as_str(), Some("two"));
        assert_eq!(arena.for_interaction(InteractionId::new(0)).count(), 1);
        assert!(arena.get(a).unwrap().is_response());
    }
}
