//! Capture builders

use harchain::{Body, Interaction, InteractionId, Request, Response};
use serde_json::{json, Value};

/// Builds an ordered list of interactions; ids follow push order.
#[derive(Default)]
pub struct CaptureBuilder {
    interactions: Vec<Interaction>,
}

impl CaptureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, request: Request, response: Response) -> Self {
        let id = InteractionId::new(self.interactions.len());
        self.interactions.push(Interaction::new(id, request, response));
        self
    }

    /// A GET with no body answered by a JSON document.
    pub fn get_json(self, url: &str, body: Value) -> Self {
        self.push(
            Request::new("GET", url),
            Response::new(200).with_body(Body::json(body.to_string())),
        )
    }

    pub fn build(self) -> Vec<Interaction> {
        self.interactions
    }
}

/// Builds HAR 1.2 text entry by entry.
#[derive(Default)]
pub struct HarBuilder {
    entries: Vec<Value>,
}

impl HarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. `request_body` and `response_body` are JSON documents.
    pub fn entry(
        mut self,
        method: &str,
        url: &str,
        headers: &[(&str, &str)],
        request_body: Option<Value>,
        response_body: Option<Value>,
    ) -> Self {
        let headers: Vec<Value> = headers
            .iter()
            .map(|(name, value)| json!({"name": name, "value": value}))
            .collect();

        let mut request = json!({
            "method": method,
            "url": url,
            "httpVersion": "HTTP/1.1",
            "headers": headers,
            "queryString": [],
        });
        if let Some(body) = request_body {
            request["postData"] = json!({"mimeType": "application/json", "text": body.to_string()});
        }

        let content = match response_body {
            Some(body) => json!({"size": 0, "mimeType": "application/json", "text": body.to_string()}),
            None => json!({"size": 0, "mimeType": "text/plain"}),
        };

        self.entries.push(json!({
            "startedDateTime": "2024-05-01T10:00:00.000Z",
            "time": 12,
            "request": request,
            "response": {
                "status": 200,
                "statusText": "OK",
                "httpVersion": "HTTP/1.1",
                "headers": [{"name": "Content-Type", "value": "application/json"}],
                "content": content,
            },
        }));
        self
    }

    pub fn build(self) -> String {
        json!({
            "log": {
                "version": "1.2",
                "creator": {"name": "test", "version": "1"},
                "entries": self.entries,
            }
        })
        .to_string()
    }
}
