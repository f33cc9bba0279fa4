//! Per-phase summary files and transcript reading.
//!
//! Each component directory holds the raw JSONL transcript written by the
//! invoker and a `cli_summary_output.json` written once the invocation has
//! returned.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::harness::{CliKind, FailureKind, ModelTier, Response, Usage};
use crate::id::RunId;
use crate::layout::{Component, Layout, RAW_TRANSCRIPT_FILE};

/// Outcome of one component's assistant invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub phase: Component,
    pub run_id: RunId,
    pub cli: CliKind,
    pub model: ModelTier,
    /// Planner: the extracted plan path. Builder: the plan consumed.
    pub plan_path: Option<String>,
    pub success: bool,
    pub failure: Option<FailureKind>,
    pub error: Option<String>,
    pub session_id: Option<String>,
    pub attempts: u32,
    /// Token and tool totals of the concluding attempt.
    #[serde(default)]
    pub usage: Usage,
    /// The full final assistant message.
    pub output: String,
    /// File name of the raw transcript next to this summary.
    pub transcript: String,
}

impl Summary {
    pub fn new(
        phase: Component,
        run_id: RunId,
        cli: CliKind,
        model: ModelTier,
        plan_path: Option<String>,
        response: &Response,
    ) -> Self {
        Self {
            phase,
            run_id,
            cli,
            model,
            plan_path,
            success: response.success,
            failure: response.failure,
            error: response.error.clone(),
            session_id: response.session_id.clone(),
            attempts: response.attempts,
            usage: response.usage,
            output: response.output.clone(),
            transcript: RAW_TRANSCRIPT_FILE.to_string(),
        }
    }
}

/// Write `summary` to its component directory. Returns the path written.
pub fn write_summary(layout: &Layout, summary: &Summary) -> std::io::Result<PathBuf> {
    let path = layout.summary_path(&summary.run_id, summary.phase);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut body = serde_json::to_vec_pretty(summary).map_err(std::io::Error::other)?;
    body.push(b'\n');
    let mut file = fs::File::create(&path)?;
    file.write_all(&body)?;
    debug!(path = %path.display(), success = summary.success, "summary written");
    Ok(path)
}

/// Read a component's summary. `Ok(None)` when the component never ran.
pub fn read_summary(
    layout: &Layout,
    run_id: &RunId,
    component: Component,
) -> std::io::Result<Option<Summary>> {
    let path = layout.summary_path(run_id, component);
    match fs::read_to_string(&path) {
        Ok(body) => serde_json::from_str(&body)
            .map(Some)
            .map_err(std::io::Error::other),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Read every complete JSON object from a transcript.
///
/// Lines that do not parse (including a partial trailing line left by a
/// killed process) are skipped.
pub fn read_events(path: &Path) -> std::io::Result<Vec<Value>> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| match serde_json::from_str::<Value>(l) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(error = %e, "skipping unparseable transcript line");
                None
            }
        })
        .collect())
}
