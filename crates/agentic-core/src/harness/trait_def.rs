//! The `Harness` trait -- the adapter interface for assistant CLIs.
//!
//! Each concrete harness (Claude Code, Copilot CLI, Gemini CLI) implements
//! this trait. Process management lives in the
//! [`Invoker`](crate::invoker::Invoker); a harness only knows how to talk
//! to its CLI: which argv to pass and how to read what comes back.

use serde_json::Value;

use super::types::{AgentEvent, CliKind, ModelTier, Request, Terminal};

/// Adapter interface for one assistant CLI.
///
/// # Object Safety
///
/// This trait is object-safe so adapters can be stored as
/// `Box<dyn Harness>` in the [`super::HarnessRegistry`].
pub trait Harness: Send + Sync {
    /// Which CLI choice this adapter serves.
    fn kind(&self) -> CliKind;

    /// Executable name or path.
    fn binary(&self) -> &str;

    /// Concrete model name for a tier.
    fn model_name(&self, tier: ModelTier) -> &'static str;

    /// Command-line arguments (excluding the binary) for a request.
    fn args(&self, request: &Request) -> Vec<String>;

    /// Turn one raw stdout line into a transcript object.
    ///
    /// `None` means the line carries nothing worth recording. The default
    /// accepts any line that parses as a JSON object.
    fn normalize_line(&self, line: &str) -> Option<Value> {
        serde_json::from_str::<Value>(line)
            .ok()
            .filter(Value::is_object)
    }

    /// Interpret one transcript object as zero or more typed events.
    fn interpret(&self, value: &Value) -> Vec<AgentEvent>;

    /// Called once the process has exited. Adapters whose CLI has no native
    /// terminal event may synthesize one here; it is recorded in the
    /// transcript like any other object.
    fn finish(&self, _events: &[AgentEvent], _exit_success: bool) -> Option<Value> {
        None
    }

    /// The final assistant message for a completed transcript.
    ///
    /// Defaults to the terminal event's text, falling back to the last
    /// assistant message.
    fn final_text(&self, terminal: &Terminal, events: &[AgentEvent]) -> String {
        if let Some(text) = &terminal.text {
            return text.clone();
        }
        events
            .iter()
            .rev()
            .find_map(|e| match e {
                AgentEvent::Message { role, content } if role == "assistant" => {
                    Some(content.clone())
                }
                _ => None,
            })
            .unwrap_or_default()
    }
}

// Compile-time assertion: Harness must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Harness) {}
};
