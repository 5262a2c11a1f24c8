//! Text oracle transport
//!
//! The oracle is any external program that reads a prompt plus a JSON
//! payload on stdin and answers on stdout. Replies are parsed tolerantly,
//! since language models like to wrap JSON in prose or code fences.

use super::CollaboratorError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// A text-in/text-out completion service.
#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn complete(&self, prompt: &str, input: &str) -> Result<String, CollaboratorError>;
}

/// Spawns a configured command per call.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
}

impl CommandOracle {
    /// Build from an argv; `None` when it is empty.
    pub fn new(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl TextOracle for CommandOracle {
    async fn complete(&self, prompt: &str, input: &str) -> Result<String, CollaboratorError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CollaboratorError::Unavailable(format!("failed to start {}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CollaboratorError::Unavailable("no stdin available".to_string()))?;
        let payload = format!("{}\n\n{}\n", prompt.trim(), input);
        stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| CollaboratorError::InvocationFailed(format!("failed to write prompt: {}", e)))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CollaboratorError::InvocationFailed(format!("failed to read reply: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollaboratorError::InvocationFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout).map_err(|e| CollaboratorError::ParseError(format!("reply is not UTF-8: {}", e)))
    }
}

/// Oracle returning scripted replies in order, for tests.
pub struct MockOracle {
    available: bool,
    replies: Mutex<VecDeque<Result<String, CollaboratorError>>>,
    calls: AtomicUsize,
}

impl MockOracle {
    /// A mock that answers from its script.
    pub fn available() -> Self {
        Self {
            available: true,
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A mock whose every call fails as unreachable.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    /// Queue a reply.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()))
    }

    /// Queue a failure.
    pub fn with_failure(self, error: CollaboratorError) -> Self {
        self.push(Err(error))
    }

    fn push(self, outcome: Result<String, CollaboratorError>) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
        self
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextOracle for MockOracle {
    async fn complete(&self, _prompt: &str, _input: &str) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(CollaboratorError::Unavailable(
                "mock oracle configured as unavailable".to_string(),
            ));
        }
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(CollaboratorError::InvocationFailed("no scripted reply left".to_string())))
    }
}

/// Extract a JSON object or array from an oracle reply.
///
/// Tries the whole reply, then a fenced code block, then the outermost
/// bracketed span.
pub fn parse_reply(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();

    if let Some(v) = parse_container(trimmed) {
        return Some(v);
    }

    let fenced = if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        after.find("```").map(|end| &after[..end])
    } else if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        after.find("```").map(|end| &after[..end])
    } else {
        None
    };
    if let Some(v) = fenced.and_then(|block| parse_container(block.trim())) {
        return Some(v);
    }

    for (open, close) in [('[', ']'), ('{', '}')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Some(v) = parse_container(&trimmed[start..=end]) {
                    return Some(v);
                }
            }
        }
    }

    None
}

fn parse_container(text: &str) -> Option<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .filter(|v| v.is_object() || v.is_array())
}
