//! Recorded request/response pairs

use serde::{Deserialize, Serialize};

/// Position of an interaction in capture order.
///
/// Capture order is the causal axis for chain detection, so ids are
/// assigned by the decoder and never reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InteractionId(usize);

impl InteractionId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for InteractionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single HTTP header as recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// A recorded message body with its declared content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    pub content_type: String,
    pub text: String,
}

/// How a body should be interpreted for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Form,
    Other,
}

impl Body {
    pub fn new(content_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            text: text.into(),
        }
    }

    pub fn json(text: impl Into<String>) -> Self {
        Self::new("application/json", text)
    }

    pub fn form(text: impl Into<String>) -> Self {
        Self::new("application/x-www-form-urlencoded", text)
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Classify by content type.
    ///
    /// A body with no declared content type is sniffed: text starting with
    /// `{` or `[` is treated as JSON.
    pub fn kind(&self) -> BodyKind {
        let mime = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime.is_empty() {
            let trimmed = self.text.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                return BodyKind::Json;
            }
            return BodyKind::Other;
        }
        if mime.ends_with("json") {
            BodyKind::Json
        } else if mime == "application/x-www-form-urlencoded" {
            BodyKind::Form
        } else {
            BodyKind::Other
        }
    }
}

/// The request half of an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: Vec<Header>,
    pub body: Option<Body>,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }
}

/// The response half of an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<Header>,
    pub body: Option<Body>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Body text, or empty when there is none.
    pub fn body_text(&self) -> &str {
        self.body.as_ref().map(|b| b.text.as_str()).unwrap_or_default()
    }
}

/// One recorded request/response pair with a fixed capture position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub request: Request,
    pub response: Response,
}

impl Interaction {
    pub fn new(id: InteractionId, request: Request, response: Response) -> Self {
        Self {
            id,
            request,
            response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_content_types_are_recognized() {
        assert_eq!(Body::json("{}").kind(), BodyKind::Json);
        assert_eq!(
            Body::new("application/vnd.api+json; charset=utf-8", "{}").kind(),
            BodyKind::Json
        );
        assert_eq!(Body::new("text/json", "[]").kind(), BodyKind::Json);
    }

    #[test]
    fn form_and_other_content_types() {
        assert_eq!(Body::form("a=1").kind(), BodyKind::Form);
        assert_eq!(Body::new("text/html", "<p>").kind(), BodyKind::Other);
        assert_eq!(Body::new("text/plain", "{\"a\":1}").kind(), BodyKind::Other);
    }

    #[test]
    fn missing_content_type_is_sniffed() {
        assert_eq!(Body::new("", "  {\"a\":1}").kind(), BodyKind::Json);
        assert_eq!(Body::new("", "a=1").kind(), BodyKind::Other);
    }

    #[test]
    fn header_names_compare_case_insensitively() {
        let h = Header::new("Authorization", "Bearer x");
        assert!(h.is_named("authorization"));
        assert!(!h.is_named("content-type"));
    }
}
