//! Claude Code harness adapter.
//!
//! Runs `claude -p <prompt> --output-format stream-json --verbose` and reads
//! its JSONL output. The stream ends with a `{"type":"result", ...}` object
//! carrying `is_error`, `subtype`, `result` (the final text) and
//! `session_id`.

use serde_json::Value;
use tracing::debug;

use super::token_usage;
use super::trait_def::Harness;
use super::types::{AgentEvent, CliKind, ModelTier, Request, Terminal};

/// Harness adapter for [Claude Code](https://docs.anthropic.com/en/docs/claude-code).
#[derive(Debug, Clone)]
pub struct ClaudeCodeAdapter {
    /// Path to the `claude` binary. Defaults to `"claude"` (found via `$PATH`).
    binary: String,
}

impl ClaudeCodeAdapter {
    pub fn new() -> Self {
        Self::with_binary("claude")
    }

    /// Use a custom binary path, e.g. a scripted fake in tests.
    pub fn with_binary(path: impl Into<String>) -> Self {
        Self {
            binary: path.into(),
        }
    }
}

impl Default for ClaudeCodeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// JSONL parsing helpers
// ---------------------------------------------------------------------------

/// Parse one stream-json object into zero or more `AgentEvent` values.
fn parse_stream_json(v: &Value) -> Vec<AgentEvent> {
    let mut events = Vec::new();

    let event_type = v.get("type").and_then(|t| t.as_str()).unwrap_or("");

    match event_type {
        // ----------------------------------------------------------------
        // system/init -- announces the session id
        // ----------------------------------------------------------------
        "system" => {
            if let Some(session_id) = v.get("session_id").and_then(|s| s.as_str()) {
                events.push(AgentEvent::Session {
                    session_id: session_id.to_string(),
                });
            }
        }

        // ----------------------------------------------------------------
        // assistant -- a message with content blocks and usage
        // ----------------------------------------------------------------
        "assistant" => {
            if let Some(message) = v.get("message") {
                if let Some(content_arr) = message.get("content").and_then(|c| c.as_array()) {
                    for block in content_arr {
                        let block_type = block.get("type").and_then(|t| t.as_str()).unwrap_or("");
                        match block_type {
                            "text" => {
                                if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                                    events.push(AgentEvent::Message {
                                        role: "assistant".to_string(),
                                        content: text.to_string(),
                                    });
                                }
                            }
                            "tool_use" => {
                                let tool = block
                                    .get("name")
                                    .and_then(|n| n.as_str())
                                    .unwrap_or("unknown")
                                    .to_string();
                                let input = block.get("input").cloned().unwrap_or(Value::Null);
                                events.push(AgentEvent::ToolCall { tool, input });
                            }
                            _ => {}
                        }
                    }
                }

                if let Some(usage) = message.get("usage").and_then(token_usage) {
                    events.push(usage);
                }
            }
        }

        // ----------------------------------------------------------------
        // user -- carries tool results back to the model
        // ----------------------------------------------------------------
        "user" => {
            let blocks = v
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(|c| c.as_array());
            for block in blocks.into_iter().flatten() {
                if block.get("type").and_then(|t| t.as_str()) == Some("tool_result") {
                    let tool = block
                        .get("tool_use_id")
                        .and_then(|n| n.as_str())
                        .unwrap_or("unknown")
                        .to_string();
                    let output = block.get("content").cloned().unwrap_or(Value::Null);
                    events.push(AgentEvent::ToolResult { tool, output });
                }
            }
        }

        // ----------------------------------------------------------------
        // result -- the terminal event
        // ----------------------------------------------------------------
        "result" => {
            let subtype = v
                .get("subtype")
                .and_then(|s| s.as_str())
                .map(str::to_string);
            let is_error = v
                .get("is_error")
                .and_then(|e| e.as_bool())
                .unwrap_or_else(|| subtype.as_deref().is_some_and(|s| s.starts_with("error")));
            if let Some(usage) = v.get("usage").and_then(token_usage) {
                events.push(usage);
            }
            events.push(AgentEvent::Result(Terminal {
                is_error,
                text: v.get("result").and_then(|r| r.as_str()).map(str::to_string),
                session_id: v
                    .get("session_id")
                    .and_then(|s| s.as_str())
                    .map(str::to_string),
                subtype,
            }));
        }

        // ----------------------------------------------------------------
        // error -- an error reported mid-stream
        // ----------------------------------------------------------------
        "error" => {
            let message = v
                .get("error")
                .and_then(|e| e.get("message").and_then(|m| m.as_str()))
                .or_else(|| v.get("message").and_then(|m| m.as_str()))
                .unwrap_or("unknown error")
                .to_string();
            events.push(AgentEvent::Error { message });
        }

        other => {
            debug!(event_type = other, "ignoring unrecognised stream-json event type");
        }
    }

    events
}

// ---------------------------------------------------------------------------
// Harness trait implementation
// ---------------------------------------------------------------------------

impl Harness for ClaudeCodeAdapter {
    fn kind(&self) -> CliKind {
        CliKind::Claude
    }

    fn binary(&self) -> &str {
        &self.binary
    }

    fn model_name(&self, tier: ModelTier) -> &'static str {
        match tier {
            ModelTier::Small => "haiku",
            ModelTier::Medium => "sonnet",
            ModelTier::Large => "opus",
        }
    }

    fn args(&self, request: &Request) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            request.prompt.clone(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--model".to_string(),
            self.model_name(request.model).to_string(),
        ];
        if request.bypass_permissions {
            args.push("--dangerously-skip-permissions".to_string());
        }
        args
    }

    fn interpret(&self, value: &Value) -> Vec<AgentEvent> {
        parse_stream_json(value)
    }
}
