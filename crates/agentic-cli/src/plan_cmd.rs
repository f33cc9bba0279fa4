//! `agentic plan` command: classify the request and produce a plan document.

use anyhow::{Context, Result};

use agentic_core::harness::HarnessRegistry;
use agentic_core::phase::{self, PlanOutcome};
use agentic_core::{Invoker, WorkflowError};

use crate::AssistantArgs;
use crate::config::AgenticConfig;
use crate::output;

/// Run the plan phase.
///
/// On success the state is emitted (JSON on a piped stdout, a summary on a
/// terminal). On assistant failure the state has been saved without
/// advancing, a summary goes to stderr, and the error carries exit code 1.
pub async fn run_plan(request: &str, args: &AssistantArgs) -> Result<()> {
    let config = AgenticConfig::resolve(args.max_attempts())?;
    let ctx = args.phase_context()?;
    let invoker = Invoker::new(HarnessRegistry::with_defaults(&config.binaries), config.retry);

    let outcome = phase::run_plan(&ctx, &invoker, request).await?;

    if let Some(err) = WorkflowError::from_response(&outcome.response) {
        eprintln!("{}", render_summary(&outcome));
        return Err(err.into());
    }

    output::emit_state_stdio(&outcome.state, &render_summary(&outcome))
        .context("failed to write plan output")?;
    Ok(())
}

fn render_summary(outcome: &PlanOutcome) -> String {
    let mut text = String::new();
    if outcome.response.success {
        text.push_str("Plan complete.\n");
    } else {
        text.push_str("Plan failed.\n");
    }
    text.push_str(&output::describe_state(&outcome.state));
    if outcome.response.success && outcome.plan_file.is_none() {
        text.push_str(
            "\nwarning: no plan file found in the planner output; \
             pass --plan-file to `agentic build`",
        );
    }
    text
}
