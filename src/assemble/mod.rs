//! Substitution and collection assembly
//!
//! Every interaction becomes one collection item. Its outbound request is
//! rewritten with the placeholders of every chain the request may use:
//! declared chains, and detected chains whose origin response came
//! earlier in the capture. Items whose response originates chains carry
//! one extraction instruction per variable.

mod collection;
mod substitute;

pub use collection::{
    Collection, CollectionItem, CollectionVariable, ExtractionInstruction, ExtractionSource, QueryPair,
    RewrittenRequest, RewrittenUrl,
};
pub use substitute::{placeholder, Substituter};

use crate::capture::{Body, BodyKind, Header, Interaction, InteractionId};
use crate::chain::{Chain, ChainSource};
use crate::collaborator::{RequestNameRequest, SequentialNamer};
use crate::config::OutputConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Stage};
use crate::extract::{LiteralValue, Locator, ValueArena};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::HashSet;

/// Headers the replay engine manages itself.
fn is_replay_managed(name: &str) -> bool {
    name.starts_with(':') || name.eq_ignore_ascii_case("content-length")
}

/// Builds the collection from a run's chains.
#[derive(Debug, Clone)]
pub struct Assembler {
    collection_name: String,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new(&OutputConfig::default())
    }
}

impl Assembler {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            collection_name: config.collection_name.clone(),
        }
    }

    /// Assemble the collection. `item_names` is positional; missing names
    /// fall back to `"{METHOD} {path}"`.
    pub fn assemble(
        &self,
        interactions: &[Interaction],
        arena: &ValueArena,
        chains: &[Chain],
        item_names: &[String],
        diagnostics: &mut Diagnostics,
    ) -> Collection {
        let origins: Vec<Option<InteractionId>> = chains.iter().map(|c| c.origin_interaction(arena)).collect();

        let items = interactions
            .iter()
            .enumerate()
            .map(|(i, interaction)| {
                let active = chains.iter().zip(&origins).filter(|(chain, origin)| match origin {
                    Some(origin) => *origin < interaction.id,
                    None => chain.is_declared(),
                });
                let names: Vec<(String, String)> = active.map(|(c, _)| (c.value.clone(), c.display_name())).collect();
                let substituter = Substituter::new(names.iter().map(|(v, n)| (v.as_str(), n.as_str())));

                let name = match item_names.get(i) {
                    Some(name) if !name.trim().is_empty() => name.clone(),
                    _ => default_item_name(interaction),
                };

                CollectionItem {
                    name,
                    interaction: interaction.id,
                    request: rewrite_request(interaction, &substituter),
                    extractions: self.extractions(interaction, arena, chains, &origins, diagnostics),
                }
            })
            .collect();

        let variables = chains.iter().map(|c| variable(c, arena, interactions)).collect();

        let mut prerequest = Vec::new();
        for chain in chains {
            if let ChainSource::Declared {
                initializer: Some(script),
            } = &chain.source
            {
                prerequest.push(script.clone());
            }
            if let Some(script) = &chain.init_script {
                prerequest.push(script.clone());
            }
        }

        let collection = Collection {
            name: self.collection_name.clone(),
            items,
            variables,
            prerequest,
        };
        tracing::info!(
            items = collection.items.len(),
            variables = collection.variables.len(),
            extractions = collection.extraction_count(),
            "assembled collection"
        );
        collection
    }

    fn extractions(
        &self,
        interaction: &Interaction,
        arena: &ValueArena,
        chains: &[Chain],
        origins: &[Option<InteractionId>],
        diagnostics: &mut Diagnostics,
    ) -> Vec<ExtractionInstruction> {
        let mut seen = HashSet::new();
        let mut instructions = Vec::new();
        let mut doc: Option<Option<serde_json::Value>> = None;

        for (chain, origin) in chains.iter().zip(origins) {
            if *origin != Some(interaction.id) {
                continue;
            }
            let variable = chain.display_name();
            if !seen.insert(variable.clone()) {
                continue;
            }
            let Some(origin_value) = chain.origin.and_then(|id| arena.get(id)) else {
                continue;
            };

            let diagnostic = |kind, message: String| {
                Diagnostic::new(Stage::Assemble, kind, message)
                    .in_interaction(interaction.id)
                    .with_value(chain.value.clone())
            };

            let (source, resolves) = match &origin_value.locator {
                Locator::Body(path) => {
                    let body = doc.get_or_insert_with(|| {
                        serde_json::from_str::<serde_json::Value>(interaction.response.body_text()).ok()
                    });
                    let resolves = body
                        .as_ref()
                        .and_then(|b| path.evaluate(b))
                        .and_then(LiteralValue::from_json)
                        .is_some_and(|v| v.canonical() == chain.value);
                    (ExtractionSource::Body(path.clone()), resolves)
                }
                Locator::Header(name) => {
                    let resolves = interaction
                        .response
                        .headers
                        .iter()
                        .any(|h| h.is_named(name) && h.value.contains(chain.value.as_str()));
                    (ExtractionSource::Header(name.clone()), resolves)
                }
                other => {
                    diagnostics.record(diagnostic(
                        DiagnosticKind::UnsupportedExtraction,
                        format!("cannot extract {} from {}", variable, other),
                    ));
                    continue;
                }
            };

            if !resolves {
                diagnostics.record(diagnostic(
                    DiagnosticKind::LocatorResolutionMismatch,
                    format!("{} does not resolve to the recorded value", source),
                ));
            }
            instructions.push(ExtractionInstruction {
                variable,
                chain: chain.id,
                source,
            });
        }
        instructions
    }
}

fn default_item_name(interaction: &Interaction) -> String {
    SequentialNamer::item_names(&[RequestNameRequest {
        method: interaction.request.method.clone(),
        url: interaction.request.url.clone(),
        sequence: interaction.id.index() + 1,
    }])
    .pop()
    .unwrap_or_else(|| interaction.request.method.clone())
}

fn rewrite_request(interaction: &Interaction, substituter: &Substituter) -> RewrittenRequest {
    let request = &interaction.request;
    let headers = request
        .headers
        .iter()
        .filter(|h| !is_replay_managed(&h.name))
        .map(|h| Header::new(h.name.clone(), substituter.apply(&h.value)))
        .collect();
    let body = request.body.as_ref().map(|b| {
        let text = match b.kind() {
            BodyKind::Form => rewrite_form(&b.text, substituter),
            _ => substituter.apply(&b.text),
        };
        Body::new(b.content_type.clone(), text)
    });

    RewrittenRequest {
        method: request.method.clone(),
        url: rewrite_url(&request.url, substituter),
        headers,
        body,
    }
}

/// Characters escaped when a rewritten path segment is re-encoded.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn encode_form(text: &str) -> String {
    url::form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

fn decode_form(text: &str) -> String {
    percent_decode_str(&text.replace('+', " ")).decode_utf8_lossy().into_owned()
}

fn rewrite_form_component(encoded: &str, substituter: &Substituter) -> String {
    substituter.apply_encoded(encoded, &decode_form(encoded), encode_form)
}

/// Rewrite one `key=value` pair of an urlencoded string.
fn rewrite_form_pair(pair: &str, substituter: &Substituter) -> (String, Option<String>) {
    match pair.split_once('=') {
        Some((key, value)) => (
            rewrite_form_component(key, substituter),
            Some(rewrite_form_component(value, substituter)),
        ),
        None => (rewrite_form_component(pair, substituter), None),
    }
}

fn join_form_pair((key, value): &(String, Option<String>)) -> String {
    match value {
        Some(value) => format!("{}={}", key, value),
        None => key.clone(),
    }
}

/// Rewrite an urlencoded form body pair by pair, keeping its encoding.
fn rewrite_form(text: &str, substituter: &Substituter) -> String {
    text.split('&')
        .map(|pair| join_form_pair(&rewrite_form_pair(pair, substituter)))
        .collect::<Vec<_>>()
        .join("&")
}

fn rewrite_path_segment(encoded: &str, substituter: &Substituter) -> String {
    let decoded = percent_decode_str(encoded).decode_utf8_lossy();
    substituter.apply_encoded(encoded, &decoded, |text| {
        utf8_percent_encode(text, PATH_SEGMENT).to_string()
    })
}

/// Rewrite a URL field by field. The raw form is rebuilt from the
/// rewritten parts so both agree.
pub fn rewrite_url(raw: &str, substituter: &Substituter) -> RewrittenUrl {
    let Ok(parsed) = url::Url::parse(raw) else {
        return RewrittenUrl {
            raw: substituter.apply(raw),
            ..RewrittenUrl::default()
        };
    };

    let host = parsed
        .host_str()
        .map(|host| match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
        .map(|host| vec![substituter.apply(&host)])
        .unwrap_or_default();

    let segments: Vec<String> = parsed
        .path()
        .split('/')
        .map(|segment| rewrite_path_segment(segment, substituter))
        .collect();
    let pairs: Vec<(String, Option<String>)> = parsed
        .query()
        .map(|query| {
            query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| rewrite_form_pair(pair, substituter))
                .collect()
        })
        .unwrap_or_default();

    let mut rewritten_raw = substituter.apply(&parsed[..url::Position::BeforePath]);
    rewritten_raw.push_str(&segments.join("/"));
    if parsed.query().is_some() {
        rewritten_raw.push('?');
        rewritten_raw.push_str(&pairs.iter().map(join_form_pair).collect::<Vec<_>>().join("&"));
    }
    if let Some(fragment) = parsed.fragment() {
        rewritten_raw.push('#');
        rewritten_raw.push_str(&substituter.apply(fragment));
    }

    RewrittenUrl {
        raw: rewritten_raw,
        protocol: parsed.scheme().to_string(),
        host,
        path: segments.into_iter().filter(|s| !s.is_empty()).collect(),
        query: pairs
            .into_iter()
            .map(|(key, value)| QueryPair {
                key,
                value: value.unwrap_or_default(),
            })
            .collect(),
    }
}

fn variable(chain: &Chain, arena: &ValueArena, interactions: &[Interaction]) -> CollectionVariable {
    let description = match &chain.source {
        ChainSource::Declared { .. } => Some("declared".to_string()),
        ChainSource::Detected => chain.origin.and_then(|id| arena.get(id)).map(|origin| {
            match interactions.get(origin.interaction.index()) {
                Some(interaction) => format!(
                    "{} from {} {}",
                    origin.locator, interaction.request.method, interaction.request.url
                ),
                None => origin.locator.to_string(),
            }
        }),
    };
    CollectionVariable {
        name: chain.display_name(),
        value: chain.value.clone(),
        description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Request, Response};
    use crate::chain::{declare_chains, link_chains, merge_chains, ChainDetector, DeclaredVariable};
    use crate::extract::Extractor;

    fn interaction(index: usize, request: Request, response: Response) -> Interaction {
        Interaction::new(InteractionId::new(index), request, response)
    }

    fn build(interactions: &[Interaction], declared: &[DeclaredVariable]) -> (Collection, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let mut arena = Extractor::default().extract_all(interactions, &mut diagnostics);
        let detected = ChainDetector::default().detect(&arena);
        let declared = declare_chains(declared, &arena);
        let mut chains = merge_chains(detected, declared, &mut diagnostics);
        for chain in chains.iter_mut().filter(|c| c.name.is_none()) {
            chain.name = Some(format!("v{}", chain.id.index()));
        }
        link_chains(&chains, &mut arena);
        let collection = Assembler::default().assemble(interactions, &arena, &chains, &[], &mut diagnostics);
        (collection, diagnostics)
    }

    fn login_flow() -> Vec<Interaction> {
        vec![
            interaction(
                0,
                Request::new("POST", "https://api.example.com/login").with_body(Body::json(r#"{"user":"alice"}"#)),
                Response::new(200).with_body(Body::json(r#"{"token":"abc123","order":{"id":"ord-77"}}"#)),
            ),
            interaction(
                1,
                Request::new("GET", "https://api.example.com/orders/ord-77?expand=ord-77")
                    .with_header("Authorization", "Bearer abc123")
                    .with_header("Content-Length", "0"),
                Response::new(200),
            ),
        ]
    }

    #[test]
    fn requests_are_rewritten_field_by_field() {
        let (collection, diagnostics) = build(&login_flow(), &[]);
        assert!(diagnostics.is_empty());

        let second = &collection.items[1].request;
        assert_eq!(second.url.raw, "https://api.example.com/orders/{{v0}}?expand={{v0}}");
        assert_eq!(second.url.protocol, "https");
        assert_eq!(second.url.host, vec!["api.example.com"]);
        assert_eq!(second.url.path, vec!["orders", "{{v0}}"]);
        assert_eq!(second.url.query[0].value, "{{v0}}");
        assert_eq!(second.headers, vec![Header::new("Authorization", "Bearer {{v1}}")]);
    }

    fn echo_flow(response: &str, request: Request) -> Vec<Interaction> {
        vec![
            interaction(
                0,
                Request::new("GET", "https://api.example.com/session"),
                Response::new(200).with_body(Body::json(response)),
            ),
            interaction(1, request, Response::new(200)),
        ]
    }

    #[test]
    fn form_bodies_are_matched_after_decoding() {
        let flow = echo_flow(
            r#"{"token":"ab+cd/ef=="}"#,
            Request::new("POST", "https://api.example.com/refresh")
                .with_body(Body::form("grant=refresh&token=ab%2Bcd%2Fef%3D%3D&scope=a+b")),
        );
        let (collection, _) = build(&flow, &[]);
        let body = collection.items[1].request.body.as_ref().unwrap();
        assert_eq!(body.text, "grant=refresh&token={{v0}}&scope=a+b");
    }

    #[test]
    fn form_text_around_a_literal_keeps_its_encoding() {
        let sub = Substituter::new([("tk 1", "t")]);
        assert_eq!(rewrite_form("q=x+tk+1+%26y&n=2", &sub), "q=x+{{t}}+%26y&n=2");
        assert_eq!(rewrite_form("flag&q=tk%201", &sub), "flag&q={{t}}");
    }

    #[test]
    fn raw_url_agrees_with_rewritten_query_pairs() {
        let flow = echo_flow(
            r#"{"next":"a b&c"}"#,
            Request::new("GET", "https://api.example.com/list?cursor=a%20b%26c&limit=50#top"),
        );
        let (collection, _) = build(&flow, &[]);
        let url = &collection.items[1].request.url;
        assert_eq!(url.raw, "https://api.example.com/list?cursor={{v0}}&limit=50#top");
        assert_eq!(url.query[0].key, "cursor");
        assert_eq!(url.query[0].value, "{{v0}}");
        assert_eq!(url.query[1].value, "50");
    }

    #[test]
    fn encoded_path_segments_are_substituted() {
        let flow = echo_flow(
            r#"{"email":"bob@x.io"}"#,
            Request::new("GET", "https://api.example.com/users/bob%40x.io/profile"),
        );
        let (collection, _) = build(&flow, &[]);
        let url = &collection.items[1].request.url;
        assert_eq!(url.raw, "https://api.example.com/users/{{v0}}/profile");
        assert_eq!(url.path, vec!["users", "{{v0}}", "profile"]);
    }

    #[test]
    fn unparseable_urls_are_rewritten_as_text() {
        let sub = Substituter::new([("ord-77", "order")]);
        let url = rewrite_url("not a url/ord-77", &sub);
        assert_eq!(url.raw, "not a url/{{order}}");
        assert!(url.protocol.is_empty());
    }

    #[test]
    fn origin_items_carry_extractions() {
        let (collection, _) = build(&login_flow(), &[]);
        let first = &collection.items[0];
        let sources: Vec<String> = first.extractions.iter().map(|e| e.source.to_string()).collect();
        assert_eq!(sources, vec!["body order.id", "body token"]);
        assert!(collection.items[1].extractions.is_empty());
    }

    #[test]
    fn origin_request_is_not_rewritten_with_its_own_chains() {
        let flow = vec![
            interaction(
                0,
                Request::new("GET", "https://api.example.com/session"),
                Response::new(200).with_body(Body::json(r#"{"sid":"s-1234"}"#)),
            ),
            interaction(
                1,
                Request::new("GET", "https://api.example.com/a?sid=s-1234"),
                Response::new(200).with_body(Body::json(r#"{"sid":"s-1234"}"#)),
            ),
        ];
        let (collection, _) = build(&flow, &[]);
        assert_eq!(collection.items[0].request.url.raw, "https://api.example.com/session");
        assert_eq!(collection.items[1].request.url.raw, "https://api.example.com/a?sid={{v0}}");
    }

    #[test]
    fn variables_document_their_origin() {
        let (collection, _) = build(&login_flow(), &[]);
        let token = collection.variable("v1").unwrap();
        assert_eq!(token.value, "abc123");
        assert_eq!(
            token.description.as_deref(),
            Some("token from POST https://api.example.com/login")
        );
    }

    #[test]
    fn declared_variables_rewrite_everywhere_and_initialize() {
        let flow = vec![
            interaction(
                0,
                Request::new("GET", "https://api.example.com/a").with_header("X-Api-Key", "key-5566"),
                Response::new(200),
            ),
            interaction(
                1,
                Request::new("GET", "https://api.example.com/b").with_header("X-Api-Key", "key-5566"),
                Response::new(200),
            ),
        ];
        let declared = [DeclaredVariable::new("apiKey", "key-5566").with_initializer("pm.collectionVariables.set('apiKey', 'x');")];
        let (collection, _) = build(&flow, &declared);

        for item in &collection.items {
            assert_eq!(item.request.headers[0].value, "{{apiKey}}");
            assert!(item.extractions.is_empty());
        }
        assert_eq!(collection.variable("apiKey").unwrap().value, "key-5566");
        assert_eq!(collection.prerequest.len(), 1);
    }

    #[test]
    fn form_origins_are_unsupported_extractions() {
        let flow = vec![
            interaction(
                0,
                Request::new("GET", "https://api.example.com/a"),
                Response::new(200).with_body(Body::form("next=n-9981")),
            ),
            interaction(
                1,
                Request::new("GET", "https://api.example.com/b").with_header("X-Next", "n-9981"),
                Response::new(200),
            ),
        ];
        let (collection, diagnostics) = build(&flow, &[]);
        assert_eq!(collection.variables.len(), 1);
        assert!(collection.items[0].extractions.is_empty());
        assert_eq!(diagnostics.count_of(DiagnosticKind::UnsupportedExtraction), 1);
        assert_eq!(collection.items[1].request.headers[0].value, "{{v0}}");
    }

    #[test]
    fn unresolvable_extractions_are_emitted_and_diagnosed() {
        let flow = login_flow();
        let mut diagnostics = Diagnostics::new();
        let mut arena = Extractor::default().extract_all(&flow, &mut diagnostics);
        let chains = ChainDetector::default().detect(&arena);
        let origin = chains[0].origin.unwrap();
        arena.get_mut(origin).unwrap().locator = Locator::Body(crate::locator::JsonPath::parse("missing").unwrap());

        let collection = Assembler::default().assemble(&flow, &arena, &chains, &[], &mut diagnostics);
        assert_eq!(collection.items[0].extractions.len(), 2);
        assert_eq!(diagnostics.count_of(DiagnosticKind::LocatorResolutionMismatch), 1);
    }

    #[test]
    fn item_names_fall_back_to_method_and_path() {
        let (collection, _) = build(&login_flow(), &[]);
        assert_eq!(collection.items[0].name, "POST /login");
        assert_eq!(collection.items[1].name, "GET /orders/ord-77");
    }
}
