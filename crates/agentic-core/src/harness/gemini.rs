//! Gemini CLI harness adapter.
//!
//! `gemini -p <prompt> --output-format stream-json` streams assistant text
//! as `message` deltas and ends with `{"type":"result","status":...}`. The
//! result object carries no text, so the final message is the concatenation
//! of the assistant deltas.

use serde_json::Value;
use tracing::debug;

use super::token_usage;
use super::trait_def::Harness;
use super::types::{AgentEvent, CliKind, ModelTier, Request, Terminal};

#[derive(Debug, Clone)]
pub struct GeminiAdapter {
    binary: String,
}

impl GeminiAdapter {
    pub fn new() -> Self {
        Self::with_binary("gemini")
    }

    pub fn with_binary(path: impl Into<String>) -> Self {
        Self {
            binary: path.into(),
        }
    }
}

impl Default for GeminiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(|s| s.as_str()).map(str::to_string)
}

impl Harness for GeminiAdapter {
    fn kind(&self) -> CliKind {
        CliKind::Gemini
    }

    fn binary(&self) -> &str {
        &self.binary
    }

    fn model_name(&self, tier: ModelTier) -> &'static str {
        match tier {
            ModelTier::Small => "gemini-2.5-flash-lite",
            ModelTier::Medium => "gemini-2.5-flash",
            ModelTier::Large => "gemini-2.5-pro",
        }
    }

    fn args(&self, request: &Request) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            request.prompt.clone(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--model".to_string(),
            self.model_name(request.model).to_string(),
        ];
        if request.bypass_permissions {
            args.push("--yolo".to_string());
        }
        args
    }

    fn interpret(&self, v: &Value) -> Vec<AgentEvent> {
        let event_type = v.get("type").and_then(|t| t.as_str()).unwrap_or("");
        match event_type {
            "init" => str_field(v, "session_id")
                .map(|session_id| AgentEvent::Session { session_id })
                .into_iter()
                .collect(),
            "message" => match (str_field(v, "role"), str_field(v, "content")) {
                (Some(role), Some(content)) => vec![AgentEvent::Message { role, content }],
                _ => Vec::new(),
            },
            "tool_use" => vec![AgentEvent::ToolCall {
                tool: str_field(v, "tool_name").unwrap_or_else(|| "unknown".to_string()),
                input: v.get("parameters").cloned().unwrap_or(Value::Null),
            }],
            "tool_result" => vec![AgentEvent::ToolResult {
                tool: str_field(v, "tool_id").unwrap_or_else(|| "unknown".to_string()),
                output: v.get("output").cloned().unwrap_or(Value::Null),
            }],
            "error" => vec![AgentEvent::Error {
                message: str_field(v, "message").unwrap_or_else(|| "unknown error".to_string()),
            }],
            "result" => {
                let status = str_field(v, "status");
                let error_text = v
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string);
                let mut events = Vec::new();
                if let Some(usage) = v.get("stats").and_then(token_usage) {
                    events.push(usage);
                }
                events.push(AgentEvent::Result(Terminal {
                    is_error: status.as_deref() != Some("success"),
                    text: error_text,
                    session_id: str_field(v, "session_id"),
                    subtype: status,
                }));
                events
            }
            other => {
                debug!(event_type = other, "ignoring unrecognised gemini event type");
                Vec::new()
            }
        }
    }

    fn final_text(&self, terminal: &Terminal, events: &[AgentEvent]) -> String {
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::Message { role, content } if role == "assistant" => {
                    Some(content.as_str())
                }
                _ => None,
            })
            .collect();
        if text.is_empty() {
            terminal.text.clone().unwrap_or_default()
        } else {
            text
        }
    }
}
