//! `agentic build` command: implement a plan for a resolved run.

use anyhow::{Context, Result};

use agentic_core::harness::HarnessRegistry;
use agentic_core::phase::{self, BuildOutcome};
use agentic_core::{Invoker, RunId, WorkflowError, WorkflowState};

use crate::AssistantArgs;
use crate::config::AgenticConfig;
use crate::output;

/// Run the build phase.
///
/// The state source is `--run-id`, else a state line on stdin, else
/// `--plan-file`. Argument and state errors are reported before any
/// assistant is started.
pub async fn run_build(
    run_id: Option<&str>,
    plan_file: Option<&str>,
    args: &AssistantArgs,
) -> Result<()> {
    let run_id = run_id
        .map(RunId::parse)
        .transpose()
        .map_err(|e| WorkflowError::BadArguments(e.to_string()))?;

    let ctx = args.phase_context()?;
    let state = phase::resolve_state(
        &ctx.layout,
        run_id.as_ref(),
        plan_file,
        WorkflowState::from_stdin,
    )?;

    let config = AgenticConfig::resolve(args.max_attempts())?;
    let invoker = Invoker::new(HarnessRegistry::with_defaults(&config.binaries), config.retry);

    let outcome = phase::run_build(&ctx, &invoker, state).await?;

    if let Some(err) = WorkflowError::from_response(&outcome.response) {
        eprintln!("{}", render_summary(&outcome));
        return Err(err.into());
    }

    output::emit_state_stdio(&outcome.state, &render_summary(&outcome))
        .context("failed to write build output")?;
    Ok(())
}

fn render_summary(outcome: &BuildOutcome) -> String {
    let headline = if outcome.response.success {
        "Build complete."
    } else {
        "Build failed."
    };
    let mut text = format!("{headline}\n{}", output::describe_state(&outcome.state));
    if outcome.response.attempts > 1 {
        text.push_str(&format!("\nAttempts:  {}", outcome.response.attempts));
    }
    text
}
