//! Postman Collection v2.1 rendering

use super::script::test_script;
use super::CollectionWriter;
use crate::assemble::{Collection, CollectionItem};
use crate::capture::BodyKind;
use crate::error::{HarchainError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const SCHEMA_URL: &str = "https://schema.getpostman.com/json/collection/v2.1.0/collection.json";

#[derive(Debug, Clone, Serialize)]
pub struct PostmanCollection {
    pub info: PostmanInfo,
    pub item: Vec<PostmanItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event: Vec<PostmanEvent>,
    pub variable: Vec<PostmanVariable>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostmanInfo {
    #[serde(rename = "_postman_id")]
    pub postman_id: String,
    pub name: String,
    pub schema: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostmanItem {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event: Vec<PostmanEvent>,
    pub request: PostmanRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostmanEvent {
    pub listen: String,
    pub script: PostmanScript,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostmanScript {
    #[serde(rename = "type")]
    pub script_type: String,
    pub exec: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostmanRequest {
    pub method: String,
    pub header: Vec<PostmanKeyValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<PostmanBody>,
    pub url: PostmanUrl,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostmanKeyValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostmanBody {
    pub mode: String,
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostmanUrl {
    pub raw: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<PostmanKeyValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostmanVariable {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub variable_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn javascript(listen: &str, exec: Vec<String>) -> PostmanEvent {
    PostmanEvent {
        listen: listen.to_string(),
        script: PostmanScript {
            script_type: "text/javascript".to_string(),
            exec,
        },
    }
}

fn item(item: &CollectionItem) -> PostmanItem {
    let request = &item.request;
    let body = request.body.as_ref().map(|b| PostmanBody {
        mode: "raw".to_string(),
        raw: b.text.clone(),
        options: match b.kind() {
            BodyKind::Json => Some(serde_json::json!({"raw": {"language": "json"}})),
            _ => None,
        },
    });

    let event = if item.extractions.is_empty() {
        Vec::new()
    } else {
        vec![javascript("test", test_script(&item.extractions))]
    };

    PostmanItem {
        name: item.name.clone(),
        event,
        request: PostmanRequest {
            method: request.method.clone(),
            header: request
                .headers
                .iter()
                .map(|h| PostmanKeyValue {
                    key: h.name.clone(),
                    value: h.value.clone(),
                })
                .collect(),
            body,
            url: PostmanUrl {
                raw: request.url.raw.clone(),
                protocol: request.url.protocol.clone(),
                host: request.url.host.clone(),
                path: request.url.path.clone(),
                query: request
                    .url
                    .query
                    .iter()
                    .map(|q| PostmanKeyValue {
                        key: q.key.clone(),
                        value: q.value.clone(),
                    })
                    .collect(),
            },
        },
    }
}

/// Convert an assembled collection to its Postman form.
pub fn to_postman(collection: &Collection) -> PostmanCollection {
    let prerequest: Vec<String> = collection
        .prerequest
        .iter()
        .flat_map(|script| script.lines().map(str::to_string).collect::<Vec<_>>())
        .collect();

    PostmanCollection {
        info: PostmanInfo {
            postman_id: uuid::Uuid::new_v4().to_string(),
            name: collection.name.clone(),
            schema: SCHEMA_URL.to_string(),
        },
        item: collection.items.iter().map(item).collect(),
        event: if prerequest.is_empty() {
            Vec::new()
        } else {
            vec![javascript("prerequest", prerequest)]
        },
        variable: collection
            .variables
            .iter()
            .map(|v| PostmanVariable {
                key: v.name.clone(),
                value: v.value.clone(),
                variable_type: "string".to_string(),
                description: v.description.clone(),
            })
            .collect(),
    }
}

/// Writes Postman v2.1 JSON to a file.
#[derive(Debug, Clone)]
pub struct PostmanWriter {
    path: PathBuf,
}

impl PostmanWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CollectionWriter for PostmanWriter {
    fn write(&self, collection: &Collection) -> Result<()> {
        let json = serde_json::to_string_pretty(&to_postman(collection))
            .map_err(|e| HarchainError::output(&self.path, e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| HarchainError::output(&self.path, e.to_string()))?;
        tracing::info!(path = %self.path.display(), items = collection.items.len(), "wrote collection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::{
        CollectionVariable, ExtractionInstruction, ExtractionSource, QueryPair, RewrittenRequest, RewrittenUrl,
    };
    use crate::capture::{Body, Header, InteractionId};
    use crate::chain::ChainId;
    use crate::locator::JsonPath;

    fn sample() -> Collection {
        Collection {
            name: "Checkout".to_string(),
            items: vec![CollectionItem {
                name: "POST /login".to_string(),
                interaction: InteractionId::new(0),
                request: RewrittenRequest {
                    method: "POST".to_string(),
                    url: RewrittenUrl {
                        raw: "https://api.example.com/login?client={{clientId}}".to_string(),
                        protocol: "https".to_string(),
                        host: vec!["api.example.com".to_string()],
                        path: vec!["login".to_string()],
                        query: vec![QueryPair {
                            key: "client".to_string(),
                            value: "{{clientId}}".to_string(),
                        }],
                    },
                    headers: vec![Header::new("Accept", "application/json")],
                    body: Some(Body::json(r#"{"user":"alice"}"#)),
                },
                extractions: vec![ExtractionInstruction {
                    variable: "authToken".to_string(),
                    chain: ChainId::new(0),
                    source: ExtractionSource::Body(JsonPath::parse("token").unwrap()),
                }],
            }],
            variables: vec![CollectionVariable {
                name: "authToken".to_string(),
                value: "abc123".to_string(),
                description: Some("token from POST https://api.example.com/login".to_string()),
            }],
            prerequest: vec!["pm.collectionVariables.set('clientId', 'web');".to_string()],
        }
    }

    #[test]
    fn renders_v21_layout() {
        let value = serde_json::to_value(to_postman(&sample())).unwrap();
        assert_eq!(value["info"]["schema"], SCHEMA_URL);
        assert_eq!(value["info"]["name"], "Checkout");
        assert!(value["info"]["_postman_id"].as_str().is_some_and(|id| id.len() == 36));

        let item = &value["item"][0];
        assert_eq!(item["request"]["url"]["host"][0], "api.example.com");
        assert_eq!(item["request"]["url"]["query"][0]["value"], "{{clientId}}");
        assert_eq!(item["request"]["body"]["mode"], "raw");
        assert_eq!(item["request"]["body"]["options"]["raw"]["language"], "json");
        assert_eq!(item["event"][0]["listen"], "test");
        assert_eq!(item["event"][0]["script"]["type"], "text/javascript");

        assert_eq!(value["variable"][0]["key"], "authToken");
        assert_eq!(value["variable"][0]["value"], "abc123");
        assert_eq!(value["event"][0]["listen"], "prerequest");
    }

    #[test]
    fn items_without_extractions_have_no_events() {
        let mut collection = sample();
        collection.items[0].extractions.clear();
        collection.prerequest.clear();
        let value = serde_json::to_value(to_postman(&collection)).unwrap();
        assert!(value["item"][0].get("event").is_none());
        assert!(value.get("event").is_none());
    }

    #[test]
    fn writer_persists_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collection.json");
        PostmanWriter::new(&path).write(&sample()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["item"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn unwritable_destination_is_an_output_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("collection.json");
        let err = PostmanWriter::new(&path).write(&sample()).unwrap_err();
        assert!(err.is_output_failure());
    }
}
