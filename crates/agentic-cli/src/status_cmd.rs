//! `agentic status` command: list runs or show one run in detail.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;

use agentic_core::state::store::list_runs;
use agentic_core::transcript::{read_events, read_summary};
use agentic_core::{Component, Layout, RunId, WorkflowError, WorkflowState};

use crate::output::describe_state;
use crate::resolve_working_dir;

/// Run the status command.
///
/// When `run_id` is `Some`, shows that run's state and per-phase outcomes.
/// When `None`, lists every run, most recently updated first.
pub fn run_status(run_id: Option<&str>, working_dir: Option<PathBuf>) -> Result<()> {
    let layout = Layout::new(resolve_working_dir(working_dir)?);
    let mut out = std::io::stdout().lock();
    match run_id {
        Some(id) => {
            let run_id =
                RunId::parse(id).map_err(|e| WorkflowError::BadArguments(e.to_string()))?;
            write_run_status(&layout, &run_id, &mut out)
        }
        None => write_run_list(&layout, &mut out),
    }
}

fn write_run_list(layout: &Layout, out: &mut impl Write) -> Result<()> {
    let runs = list_runs(layout).map_err(WorkflowError::from)?;
    if runs.is_empty() {
        writeln!(out, "No runs found under {}", layout.runs_dir().display())?;
        return Ok(());
    }

    writeln!(
        out,
        "{:<10} {:<8} {:<9} {:<20} PLAN FILE",
        "RUN", "PHASE", "TYPE", "UPDATED"
    )?;
    for state in &runs {
        let task_type = state
            .task_type()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{:<10} {:<8} {:<9} {:<20} {}",
            state.run_id().as_str(),
            state.last_phase().as_str(),
            task_type,
            state.updated_at().format("%Y-%m-%d %H:%M:%S"),
            state.plan_file().unwrap_or("-"),
        )?;
    }
    Ok(())
}

fn write_run_status(layout: &Layout, run_id: &RunId, out: &mut impl Write) -> Result<()> {
    let state = WorkflowState::load_required(run_id, layout).map_err(WorkflowError::from)?;

    writeln!(out, "{}", describe_state(&state))?;
    writeln!(
        out,
        "Updated:   {}",
        state.updated_at().format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out)?;
    writeln!(out, "Phases:")?;

    for component in Component::ALL {
        let name = component.as_str();
        let Some(summary) = read_summary(layout, run_id, component)? else {
            writeln!(out, "  {name:<10} not run")?;
            continue;
        };
        let events = read_events(&layout.raw_transcript_path(run_id, component))
            .map(|events| events.len())
            .unwrap_or(0);
        let outcome = if summary.success {
            "ok".to_string()
        } else {
            match summary.failure {
                Some(kind) => format!("failed ({kind})"),
                None => "failed".to_string(),
            }
        };
        writeln!(
            out,
            "  {name:<10} {outcome} via {} {} in {} attempt(s), {events} transcript event(s)",
            summary.cli, summary.model, summary.attempts
        )?;
        let usage = summary.usage;
        if usage != Default::default() {
            writeln!(
                out,
                "             usage: {} in / {} out tokens, {} tool call(s)",
                usage.input_tokens, usage.output_tokens, usage.tool_calls
            )?;
        }
        if let Some(error) = &summary.error {
            writeln!(out, "             error: {error}")?;
        }
    }
    Ok(())
}
