//! Naming through a real oracle command
//!
//! Run with `--features real_oracle` and `HARCHAIN_ORACLE_CMD` set to the
//! command line of a text oracle, e.g. `HARCHAIN_ORACLE_CMD="llm -m gpt-4o-mini"`.

#![cfg(feature = "real_oracle")]

mod common;

use common::CaptureBuilder;
use harchain::{Pipeline, PipelineConfig, Request, Response};
use serde_json::json;

#[tokio::test]
async fn real_oracle_names_every_chain() {
    let command: Vec<String> = std::env::var("HARCHAIN_ORACLE_CMD")
        .expect("HARCHAIN_ORACLE_CMD must be set")
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let mut config = PipelineConfig::default();
    config.collaborators.command = command;

    let capture = CaptureBuilder::new()
        .get_json("https://api.example.com/session", json!({"token": "abc123"}))
        .push(
            Request::new("GET", "https://api.example.com/me").with_header("Authorization", "Bearer abc123"),
            Response::new(200),
        )
        .build();

    let assembly = Pipeline::from_config(config).run(capture, &[]).await;
    assert_eq!(assembly.chains.len(), 1);
    let name = assembly.chains[0].name.clone().unwrap();
    assert!(!name.is_empty());
    assert_eq!(
        assembly.collection.items[1].request.headers[0].value,
        format!("Bearer {{{{{}}}}}", name)
    );
}
