//! Types shared by the backend adapters and the invoker.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::id::RunId;
use crate::layout::Component;
use crate::state::ParseEnumError;

// ---------------------------------------------------------------------------
// Backend choice and model tier
// ---------------------------------------------------------------------------

/// Which external assistant CLI to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CliKind {
    #[default]
    Claude,
    Copilot,
    Gemini,
}

impl CliKind {
    pub const ALL: [Self; 3] = [Self::Claude, Self::Copilot, Self::Gemini];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Copilot => "copilot",
            Self::Gemini => "gemini",
        }
    }
}

impl fmt::Display for CliKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CliKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(Self::Claude),
            "copilot" => Ok(Self::Copilot),
            "gemini" => Ok(Self::Gemini),
            other => Err(ParseEnumError::new("cli", other)),
        }
    }
}

/// Abstract model size; each adapter maps it to a concrete model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Small,
    Medium,
    #[default]
    Large,
}

impl ModelTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    /// Per-attempt timeout used when none is configured.
    pub fn default_timeout(self) -> Duration {
        let minutes = match self {
            Self::Small => 10,
            Self::Medium => 20,
            Self::Large => 30,
        };
        Duration::from_secs(minutes * 60)
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelTier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            other => Err(ParseEnumError::new("model tier", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/// Everything needed to run the assistant once (with retries).
#[derive(Debug, Clone)]
pub struct Request {
    /// Fully rendered prompt text.
    pub prompt: String,
    pub run_id: RunId,
    pub component: Component,
    pub model: ModelTier,
    pub cli: CliKind,
    /// Pass the backend's "skip permission prompts" flag.
    pub bypass_permissions: bool,
    /// Absolute path of the JSONL transcript to write.
    pub output_path: PathBuf,
    /// Directory the assistant process runs in.
    pub working_dir: PathBuf,
    /// Make exactly one attempt regardless of the retry policy.
    pub single_attempt: bool,
}

/// Why an invocation did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Nonzero exit, missing binary, or timeout.
    ProcessFailed,
    /// No transcript events were parsed.
    TranscriptEmpty,
    /// Events were parsed but no terminal event arrived.
    TranscriptMalformed,
    /// The terminal event is present and marked as an error.
    AssistantReportedError,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProcessFailed => "process_failed",
            Self::TranscriptEmpty => "transcript_empty",
            Self::TranscriptMalformed => "transcript_malformed",
            Self::AssistantReportedError => "assistant_reported_error",
        }
    }

    /// Whether another attempt may help.
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::AssistantReportedError)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an invocation. Failures are data, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub success: bool,
    /// Final assistant message (empty when none was produced).
    pub output: String,
    pub session_id: Option<String>,
    pub failure: Option<FailureKind>,
    /// Human-readable failure reason.
    pub error: Option<String>,
    /// Number of attempts made (0 if the backend could not be resolved).
    pub attempts: u32,
    /// Token and tool activity of the concluding attempt.
    pub usage: Usage,
}

impl Response {
    pub fn succeeded(output: impl Into<String>, session_id: Option<String>, attempts: u32) -> Self {
        Self {
            success: true,
            output: output.into(),
            session_id,
            failure: None,
            error: None,
            attempts,
            usage: Usage::default(),
        }
    }

    pub fn failed(kind: FailureKind, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            success: false,
            output: String::new(),
            session_id: None,
            failure: Some(kind),
            error: Some(error.into()),
            attempts,
            usage: Usage::default(),
        }
    }

    /// Failure message suitable for a single-line diagnostic.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown failure")
    }
}

/// Totals folded from an attempt's transcript events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub tool_calls: u32,
    pub tool_results: u32,
}

impl Usage {
    /// Fold one event into the totals. Events other than tool activity and
    /// token usage are ignored.
    pub fn record(&mut self, event: &AgentEvent) {
        match event {
            AgentEvent::TokenUsage {
                input_tokens,
                output_tokens,
            } => {
                self.input_tokens += input_tokens;
                self.output_tokens += output_tokens;
            }
            AgentEvent::ToolCall { .. } => self.tool_calls += 1,
            AgentEvent::ToolResult { .. } => self.tool_results += 1,
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Transcript events
// ---------------------------------------------------------------------------

/// The terminal completion event of a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Terminal {
    pub is_error: bool,
    pub text: Option<String>,
    pub session_id: Option<String>,
    /// Backend-specific detail, e.g. `"success"` or `"error_max_turns"`.
    pub subtype: Option<String>,
}

/// A typed view of one transcript object.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// The backend announced its session identifier.
    Session { session_id: String },
    /// A text message from the assistant (or another role).
    Message { role: String, content: String },
    ToolCall {
        tool: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool: String,
        output: serde_json::Value,
    },
    TokenUsage {
        input_tokens: u64,
        output_tokens: u64,
    },
    /// A non-terminal error reported mid-stream.
    Error { message: String },
    /// Terminal completion.
    Result(Terminal),
}
