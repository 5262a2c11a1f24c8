//! Extractor: turns each interaction into a flat set of located values
//!
//! Request and response sides are extracted independently. Sub-sources
//! that fail to parse (a malformed JSON body, an unparseable URL) yield
//! nothing and leave a diagnostic; the rest of the interaction is still
//! extracted.

mod filter;
mod value;

pub use filter::InterestFilter;
pub use value::{Direction, ExtractedValue, LiteralValue, Locator, ValueArena, ValueId};

use crate::capture::{Body, BodyKind, Header, Interaction, InteractionId};
use crate::config::ExtractConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Stage};
use crate::locator::flatten;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;

/// Pulls candidate values out of interactions.
#[derive(Debug, Clone)]
pub struct Extractor {
    ignored_headers: Vec<String>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(&ExtractConfig::default())
    }
}

impl Extractor {
    pub fn new(config: &ExtractConfig) -> Self {
        Self {
            ignored_headers: config
                .ignored_headers
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
        }
    }

    /// True for headers that are never extracted.
    pub fn is_ignored_header(&self, name: &str) -> bool {
        name.starts_with(':') || self.ignored_headers.iter().any(|h| name.eq_ignore_ascii_case(h))
    }

    /// Extract every interaction in order into one arena.
    pub fn extract_all(&self, interactions: &[Interaction], diagnostics: &mut Diagnostics) -> ValueArena {
        let mut arena = ValueArena::new();
        for interaction in interactions {
            self.extract(interaction, &mut arena, diagnostics);
        }
        tracing::info!(
            interactions = interactions.len(),
            values = arena.len(),
            "extracted candidate values"
        );
        arena
    }

    /// Extract one interaction: request side (body, headers, URL), then
    /// response side (body, headers). Returns the number of values added.
    pub fn extract(
        &self,
        interaction: &Interaction,
        arena: &mut ValueArena,
        diagnostics: &mut Diagnostics,
    ) -> usize {
        let before = arena.len();
        let id = interaction.id;
        let mut sink = |direction, locator, value| {
            arena.push(id, direction, locator, value);
        };

        let request = &interaction.request;
        if let Some(body) = &request.body {
            self.extract_body(id, Direction::Request, body, &mut sink, diagnostics);
        }
        self.extract_headers(Direction::Request, &request.headers, &mut sink);
        self.extract_url(id, &request.url, &mut sink, diagnostics);

        let response = &interaction.response;
        if let Some(body) = &response.body {
            self.extract_body(id, Direction::Response, body, &mut sink, diagnostics);
        }
        self.extract_headers(Direction::Response, &response.headers, &mut sink);

        let added = arena.len() - before;
        tracing::debug!(interaction = id.index(), url = %request.url, values = added, "extracted interaction");
        added
    }

    fn extract_body(
        &self,
        id: InteractionId,
        direction: Direction,
        body: &Body,
        sink: &mut impl FnMut(Direction, Locator, LiteralValue),
        diagnostics: &mut Diagnostics,
    ) {
        if body.is_blank() {
            return;
        }
        match body.kind() {
            BodyKind::Json => match serde_json::from_str::<serde_json::Value>(&body.text) {
                Ok(doc) => {
                    for (path, leaf) in flatten(&doc) {
                        if let Some(value) = LiteralValue::from_json(leaf) {
                            sink(direction, Locator::Body(path), value);
                        }
                    }
                }
                Err(e) => diagnostics.record(
                    Diagnostic::new(
                        Stage::Extract,
                        DiagnosticKind::MalformedBody,
                        format!("{} body is not valid JSON: {}", direction, e),
                    )
                    .in_interaction(id),
                ),
            },
            BodyKind::Form => {
                let mut seen: HashMap<String, usize> = HashMap::new();
                for (key, value) in url::form_urlencoded::parse(body.text.trim().as_bytes()) {
                    let count = seen.entry(key.to_string()).or_insert(0);
                    sink(
                        direction,
                        Locator::Form {
                            key: key.into_owned(),
                            index: *count,
                        },
                        LiteralValue::String(value.into_owned()),
                    );
                    *count += 1;
                }
            }
            BodyKind::Other => {}
        }
    }

    fn extract_headers(
        &self,
        direction: Direction,
        headers: &[Header],
        sink: &mut impl FnMut(Direction, Locator, LiteralValue),
    ) {
        for header in headers {
            if self.is_ignored_header(&header.name) {
                continue;
            }
            let value = if header.is_named("authorization") {
                strip_bearer(&header.value)
            } else {
                header.value.as_str()
            };
            sink(
                direction,
                Locator::Header(header.name.clone()),
                LiteralValue::String(value.to_string()),
            );
        }
    }

    fn extract_url(
        &self,
        id: InteractionId,
        raw: &str,
        sink: &mut impl FnMut(Direction, Locator, LiteralValue),
        diagnostics: &mut Diagnostics,
    ) {
        let parsed = match url::Url::parse(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                diagnostics.record(
                    Diagnostic::new(
                        Stage::Extract,
                        DiagnosticKind::MalformedUrl,
                        format!("request URL does not parse: {}", e),
                    )
                    .in_interaction(id)
                    .with_value(raw),
                );
                return;
            }
        };

        if let Some(host) = parsed.host_str() {
            sink(Direction::Request, Locator::Host, LiteralValue::from(host));
        }

        for (i, segment) in path_segments(&parsed).into_iter().enumerate() {
            sink(
                Direction::Request,
                Locator::PathSegment(i),
                LiteralValue::String(segment),
            );
        }

        let mut seen: HashMap<String, usize> = HashMap::new();
        for (key, value) in parsed.query_pairs() {
            let count = seen.entry(key.to_string()).or_insert(0);
            sink(
                Direction::Request,
                Locator::Query {
                    key: key.into_owned(),
                    index: *count,
                },
                LiteralValue::String(value.into_owned()),
            );
            *count += 1;
        }
    }
}

/// Non-empty path segments, percent-decoded. Dot segments are already
/// resolved by the URL parser.
pub(crate) fn path_segments(url: &url::Url) -> Vec<String> {
    url.path()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .collect()
}

/// Drop a leading `Bearer ` scheme so the chained value is the bare token.
pub(crate) fn strip_bearer(value: &str) -> &str {
    match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => &value[7..],
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Request, Response};

    fn interaction(request: Request, response: Response) -> Interaction {
        Interaction::new(InteractionId::new(0), request, response)
    }

    fn collect(interaction: &Interaction) -> (ValueArena, Diagnostics) {
        let mut arena = ValueArena::new();
        let mut diagnostics = Diagnostics::new();
        Extractor::default().extract(interaction, &mut arena, &mut diagnostics);
        (arena, diagnostics)
    }

    fn rendered(arena: &ValueArena, direction: Direction) -> Vec<(String, String)> {
        arena
            .iter()
            .filter(|v| v.direction == direction)
            .map(|v| (v.locator.to_string(), v.value.canonical()))
            .collect()
    }

    #[test]
    fn json_body_flattens_into_leaf_values() {
        let (arena, diags) = collect(&interaction(
            Request::new("GET", "https://api.example.com"),
            Response::new(200).with_body(Body::json(r#"{"data":{"items":[{"id":"a1"},{"id":"b2"}]},"n":1500}"#)),
        ));
        assert!(diags.is_empty());
        assert_eq!(
            rendered(&arena, Direction::Response),
            vec![
                ("data.items[0].id".to_string(), "a1".to_string()),
                ("data.items[1].id".to_string(), "b2".to_string()),
                ("n".to_string(), "1500".to_string()),
            ]
        );
    }

    #[test]
    fn bearer_prefix_is_stripped_from_authorization() {
        let (arena, _) = collect(&interaction(
            Request::new("GET", "https://api.example.com")
                .with_header("Authorization", "Bearer abc123")
                .with_header("X-Client", "web-7"),
            Response::new(204),
        ));
        let headers: Vec<_> = rendered(&arena, Direction::Request)
            .into_iter()
            .filter(|(l, _)| l != "host")
            .collect();
        assert_eq!(
            headers,
            vec![
                ("Authorization".to_string(), "abc123".to_string()),
                ("X-Client".to_string(), "web-7".to_string()),
            ]
        );
    }

    #[test]
    fn noise_headers_are_dropped() {
        let (arena, _) = collect(&interaction(
            Request::new("GET", "https://api.example.com")
                .with_header("Connection", "keep-alive")
                .with_header(":authority", "api.example.com")
                .with_header("Content-Length", "1234"),
            Response::new(200).with_header("X-Powered-By", "Express"),
        ));
        assert!(arena.iter().all(|v| v.locator.header_name().is_none()));
    }

    #[test]
    fn url_yields_host_segments_and_query_values() {
        let (arena, _) = collect(&interaction(
            Request::new("GET", "https://api.example.com/v1//orders/./ord-991/items?page=2&tag=a&tag=b"),
            Response::new(200),
        ));
        assert_eq!(
            rendered(&arena, Direction::Request),
            vec![
                ("host".to_string(), "api.example.com".to_string()),
                ("path[0]".to_string(), "v1".to_string()),
                ("path[1]".to_string(), "orders".to_string()),
                ("path[2]".to_string(), "ord-991".to_string()),
                ("path[3]".to_string(), "items".to_string()),
                ("query.page[0]".to_string(), "2".to_string()),
                ("query.tag[0]".to_string(), "a".to_string()),
                ("query.tag[1]".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn path_segments_are_percent_decoded() {
        let (arena, _) = collect(&interaction(
            Request::new("GET", "https://api.example.com/users/bob%40x.io/caf%C3%A9"),
            Response::new(200),
        ));
        let segments: Vec<String> = rendered(&arena, Direction::Request)
            .into_iter()
            .filter(|(locator, _)| locator.starts_with("path"))
            .map(|(_, value)| value)
            .collect();
        assert_eq!(segments, vec!["users", "bob@x.io", "café"]);
    }

    #[test]
    fn form_body_uses_indexed_keys() {
        let (arena, _) = collect(&interaction(
            Request::new("POST", "https://api.example.com")
                .with_body(Body::form("user=alice&role=admin&role=ops")),
            Response::new(200),
        ));
        let form: Vec<_> = rendered(&arena, Direction::Request)
            .into_iter()
            .filter(|(l, _)| l.contains("[") && !l.starts_with("path"))
            .collect();
        assert_eq!(
            form,
            vec![
                ("user[0]".to_string(), "alice".to_string()),
                ("role[0]".to_string(), "admin".to_string()),
                ("role[1]".to_string(), "ops".to_string()),
            ]
        );
    }

    #[test]
    fn malformed_json_body_is_diagnosed_and_skipped() {
        let (arena, diags) = collect(&interaction(
            Request::new("POST", "https://api.example.com/x")
                .with_body(Body::json("{\"broken\": "))
                .with_header("X-Trace", "t-1"),
            Response::new(200).with_body(Body::json(r#"{"ok":"yes"}"#)),
        ));
        assert_eq!(diags.count_of(DiagnosticKind::MalformedBody), 1);
        assert!(arena.iter().any(|v| v.value.as_str() == Some("t-1")));
        assert!(arena.iter().any(|v| v.value.as_str() == Some("yes")));
    }

    #[test]
    fn blank_and_opaque_bodies_yield_nothing() {
        let (arena, diags) = collect(&interaction(
            Request::new("POST", "not a url").with_body(Body::json("   ")),
            Response::new(200).with_body(Body::new("text/html", "<html>token</html>")),
        ));
        assert!(arena.is_empty());
        assert_eq!(diags.count_of(DiagnosticKind::MalformedUrl), 1);
        assert_eq!(diags.count_of(DiagnosticKind::MalformedBody), 0);
    }

    #[test]
    fn request_values_precede_response_values() {
        let (arena, _) = collect(&interaction(
            Request::new("GET", "https://api.example.com/a"),
            Response::new(200).with_header("X-Session", "s-42"),
        ));
        let directions: Vec<_> = arena.iter().map(|v| v.direction).collect();
        let first_response = directions.iter().position(|d| *d == Direction::Response).unwrap();
        assert!(directions[..first_response].iter().all(|d| *d == Direction::Request));
    }

    #[test]
    fn strip_bearer_is_case_insensitive_on_scheme() {
        assert_eq!(strip_bearer("Bearer tok"), "tok");
        assert_eq!(strip_bearer("bearer tok"), "tok");
        assert_eq!(strip_bearer("Basic dXNlcg=="), "Basic dXNlcg==");
        assert_eq!(strip_bearer("Bear"), "Bear");
    }
}
