//! Copilot CLI harness adapter.
//!
//! `copilot -p <prompt>` prints plain text, not JSONL. Each non-blank stdout
//! line is recorded as `{"type":"text","text":…}`, and on a clean exit a
//! terminal `{"type":"result","subtype":"success",…}` holding all of the
//! text is synthesized.

use serde_json::{Value, json};

use super::trait_def::Harness;
use super::types::{AgentEvent, CliKind, ModelTier, Request, Terminal};

#[derive(Debug, Clone)]
pub struct CopilotAdapter {
    binary: String,
}

impl CopilotAdapter {
    pub fn new() -> Self {
        Self::with_binary("copilot")
    }

    pub fn with_binary(path: impl Into<String>) -> Self {
        Self {
            binary: path.into(),
        }
    }
}

impl Default for CopilotAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness for CopilotAdapter {
    fn kind(&self) -> CliKind {
        CliKind::Copilot
    }

    fn binary(&self) -> &str {
        &self.binary
    }

    fn model_name(&self, tier: ModelTier) -> &'static str {
        match tier {
            ModelTier::Small => "gpt-5-mini",
            ModelTier::Medium => "claude-sonnet-4.5",
            ModelTier::Large => "gpt-5",
        }
    }

    fn args(&self, request: &Request) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            request.prompt.clone(),
            "--model".to_string(),
            self.model_name(request.model).to_string(),
            "--no-color".to_string(),
        ];
        if request.bypass_permissions {
            args.push("--allow-all-tools".to_string());
        }
        args
    }

    fn normalize_line(&self, line: &str) -> Option<Value> {
        if line.trim().is_empty() {
            return None;
        }
        Some(json!({ "type": "text", "text": line }))
    }

    fn interpret(&self, v: &Value) -> Vec<AgentEvent> {
        match v.get("type").and_then(|t| t.as_str()) {
            Some("text") => v
                .get("text")
                .and_then(|t| t.as_str())
                .map(|text| AgentEvent::Message {
                    role: "assistant".to_string(),
                    content: text.to_string(),
                })
                .into_iter()
                .collect(),
            Some("result") => vec![AgentEvent::Result(Terminal {
                is_error: v.get("is_error").and_then(|e| e.as_bool()).unwrap_or(false),
                text: v.get("result").and_then(|r| r.as_str()).map(str::to_string),
                session_id: None,
                subtype: v.get("subtype").and_then(|s| s.as_str()).map(str::to_string),
            })],
            _ => Vec::new(),
        }
    }

    fn finish(&self, events: &[AgentEvent], exit_success: bool) -> Option<Value> {
        if !exit_success {
            return None;
        }
        let lines: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::Message { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        if lines.is_empty() {
            return None;
        }
        Some(json!({
            "type": "result",
            "subtype": "success",
            "is_error": false,
            "result": lines.join("\n"),
        }))
    }
}
