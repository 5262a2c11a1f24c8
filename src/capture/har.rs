//! HAR 1.2 decoder
//!
//! Turns a HAR document into the ordered interaction list the pipeline
//! consumes. Only the fields the pipeline reads are modelled; everything
//! else in the document is ignored.

use super::interaction::{Body, Header, Interaction, InteractionId, Request, Response};
use crate::error::{HarchainError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct HarDocument {
    log: HarLog,
}

#[derive(Debug, Deserialize)]
struct HarLog {
    #[serde(default)]
    entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
struct HarEntry {
    request: HarRequest,
    response: HarResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HarRequest {
    method: String,
    url: String,
    #[serde(default)]
    headers: Vec<HarHeader>,
    #[serde(default)]
    post_data: Option<HarPostData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HarPostData {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    params: Vec<HarParam>,
}

#[derive(Debug, Deserialize)]
struct HarParam {
    name: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HarHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct HarResponse {
    status: i64,
    #[serde(default)]
    headers: Vec<HarHeader>,
    #[serde(default)]
    content: Option<HarContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HarContent {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

fn convert_headers(headers: Vec<HarHeader>) -> Vec<Header> {
    headers
        .into_iter()
        .map(|h| Header::new(h.name, h.value))
        .collect()
}

fn request_body(post_data: Option<HarPostData>) -> Option<Body> {
    let post_data = post_data?;
    match post_data.text {
        Some(text) if !text.is_empty() => Some(Body::new(post_data.mime_type, text)),
        _ if !post_data.params.is_empty() => {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            for param in &post_data.params {
                form.append_pair(&param.name, param.value.as_deref().unwrap_or_default());
            }
            Some(Body::new(post_data.mime_type, form.finish()))
        }
        _ => None,
    }
}

fn response_body(content: Option<HarContent>) -> Option<Body> {
    let content = content?;
    // Encoded payloads are binary as far as extraction is concerned.
    if content.encoding.as_deref() == Some("base64") {
        return None;
    }
    let text = content.text.filter(|t| !t.is_empty())?;
    Some(Body::new(content.mime_type, text))
}

/// Decode a HAR document into interactions, in entry order.
pub fn decode_har(text: &str) -> Result<Vec<Interaction>> {
    let document: HarDocument = serde_json::from_str(text)
        .map_err(|e| HarchainError::Capture(format!("invalid HAR document: {}", e)))?;

    document
        .log
        .entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let status = u16::try_from(entry.response.status).unwrap_or(0);
            let request = Request {
                method: entry.request.method,
                url: entry.request.url,
                headers: convert_headers(entry.request.headers),
                body: request_body(entry.request.post_data),
            };
            let response = Response {
                status,
                headers: convert_headers(entry.response.headers),
                body: response_body(entry.response.content),
            };
            Ok(Interaction::new(InteractionId::new(index), request, response))
        })
        .collect()
}

/// Read and decode a HAR file.
pub fn read_har(path: &Path) -> Result<Vec<Interaction>> {
    let text = std::fs::read_to_string(path).map_err(|e| HarchainError::io(path, e))?;
    let interactions = decode_har(&text)?;
    tracing::info!(path = %path.display(), entries = interactions.len(), "decoded capture");
    Ok(interactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::BodyKind;

    const SAMPLE: &str = r#"{
        "log": {
            "version": "1.2",
            "entries": [
                {
                    "request": {
                        "method": "POST",
                        "url": "https://api.example.com/login",
                        "headers": [{"name": "Content-Type", "value": "application/json"}],
                        "postData": {"mimeType": "application/json", "text": "{\"user\":\"alice\"}"}
                    },
                    "response": {
                        "status": 200,
                        "statusText": "OK",
                        "headers": [],
                        "content": {"mimeType": "application/json", "text": "{\"token\":\"abc123\"}"}
                    }
                },
                {
                    "request": {
                        "method": "POST",
                        "url": "https://api.example.com/search",
                        "postData": {
                            "mimeType": "application/x-www-form-urlencoded",
                            "params": [{"name": "q", "value": "red shoes"}, {"name": "page", "value": "2"}]
                        }
                    },
                    "response": {
                        "status": 204,
                        "content": {"mimeType": "image/png", "text": "iVBORw0KGgo=", "encoding": "base64"}
                    }
                }
            ]
        }
    }"#;

    #[test]
    fn entries_decode_in_order() {
        let interactions = decode_har(SAMPLE).unwrap();
        assert_eq!(interactions.len(), 2);
        assert_eq!(interactions[0].id, InteractionId::new(0));
        assert_eq!(interactions[1].id, InteractionId::new(1));
        assert_eq!(interactions[0].request.method, "POST");
        assert_eq!(interactions[0].response.status, 200);
        assert_eq!(interactions[0].response.body_text(), "{\"token\":\"abc123\"}");
    }

    #[test]
    fn form_params_are_synthesized_into_text() {
        let interactions = decode_har(SAMPLE).unwrap();
        let body = interactions[1].request.body.as_ref().unwrap();
        assert_eq!(body.kind(), BodyKind::Form);
        assert_eq!(body.text, "q=red+shoes&page=2");
    }

    #[test]
    fn base64_content_is_treated_as_absent() {
        let interactions = decode_har(SAMPLE).unwrap();
        assert!(interactions[1].response.body.is_none());
    }

    #[test]
    fn malformed_document_is_a_capture_error() {
        let err = decode_har("{\"log\": 5}").unwrap_err();
        assert!(matches!(err, HarchainError::Capture(_)));
    }
}
