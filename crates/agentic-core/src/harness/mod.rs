//! Harness adapters for assistant CLIs.
//!
//! This module defines the [`Harness`] trait that every backend adapter
//! implements, the shared request/response/event types, and the
//! [`HarnessRegistry`] that maps a [`CliKind`] to its adapter.
//!
//! # Architecture
//!
//! ```text
//! Invoker
//!     |
//!     v
//! HarnessRegistry --get(CliKind::Claude)--> &dyn Harness
//!     |                                         |
//!     |   args(request) ------------------------+--> spawn child
//!     |   normalize_line(stdout line) -> JSON transcript object
//!     |   interpret(object) -> Vec<AgentEvent>
//!     |   finish(events, exit) -> synthesized terminal object
//!     |   final_text(terminal, events)
//! ```

pub mod claude_code;
pub mod copilot;
pub mod gemini;
pub mod registry;
pub mod trait_def;
pub mod types;

pub use claude_code::ClaudeCodeAdapter;
pub use copilot::CopilotAdapter;
pub use gemini::GeminiAdapter;
pub use registry::{BackendBinaries, HarnessRegistry};
pub use trait_def::Harness;
pub use types::{AgentEvent, CliKind, FailureKind, ModelTier, Request, Response, Terminal, Usage};

/// Read `input_tokens`/`output_tokens` from a usage object.
///
/// Returns `None` when both are zero or absent.
pub(crate) fn token_usage(usage: &serde_json::Value) -> Option<AgentEvent> {
    let input_tokens = usage
        .get("input_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let output_tokens = usage
        .get("output_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    (input_tokens > 0 || output_tokens > 0).then_some(AgentEvent::TokenUsage {
        input_tokens,
        output_tokens,
    })
}
