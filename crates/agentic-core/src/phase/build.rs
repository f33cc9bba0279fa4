//! The build phase: resolve a run's state and have the assistant implement
//! its plan.

use std::fs;

use tracing::{debug, info};

use super::PhaseContext;
use crate::error::WorkflowError;
use crate::harness::Response;
use crate::id::RunId;
use crate::invoker::Assistant;
use crate::layout::{Component, Layout};
use crate::state::{Phase, WorkflowState};
use crate::template::{self, TemplateName};

/// Shown when build has nothing to work from.
pub const BUILD_USAGE: &str = "\
no workflow state to build from; use one of:
  agentic build --run-id <RUN_ID>
  agentic plan \"<request>\" | agentic build
  agentic build --plan-file agentic/specs/<plan>.md";

/// What the build phase produced. The state has already been persisted.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub state: WorkflowState,
    pub response: Response,
}

/// Decide which state the build phase works on.
///
/// In order: an explicit `run_id` (which must exist on disk), a state
/// record piped on stdin, a direct `plan_file` (seeding a fresh run).
/// `piped` is only consulted when no `run_id` is given. A piped record whose
/// run already has a `state.json` is replaced by the persisted one.
pub fn resolve_state(
    layout: &Layout,
    run_id: Option<&RunId>,
    plan_file: Option<&str>,
    piped: impl FnOnce() -> Option<WorkflowState>,
) -> Result<WorkflowState, WorkflowError> {
    if run_id.is_some() && plan_file.is_some() {
        return Err(WorkflowError::BadArguments(
            "--run-id and --plan-file cannot be used together".to_string(),
        ));
    }

    if let Some(run_id) = run_id {
        let state = WorkflowState::load_required(run_id, layout)?;
        info!(run_id = %run_id, "resolved state from run id");
        return Ok(state);
    }

    if let Some(state) = piped() {
        if let Some(persisted) = WorkflowState::load(state.run_id(), layout)? {
            if persisted != state {
                debug!(
                    run_id = %state.run_id(),
                    "piped state differs from state.json, using state.json"
                );
            }
            info!(run_id = %persisted.run_id(), "resolved state from stdin");
            return Ok(persisted);
        }
        info!(run_id = %state.run_id(), "resolved state from stdin");
        return Ok(state);
    }

    if let Some(plan_file) = plan_file {
        let run_id = RunId::generate_unused(&layout.runs_dir());
        let state = WorkflowState::from_plan_file(run_id, layout.relativize(plan_file));
        info!(run_id = %state.run_id(), "seeded new run from plan file");
        return Ok(state);
    }

    Err(WorkflowError::BadArguments(BUILD_USAGE.to_string()))
}

/// Run the build phase on a resolved state.
///
/// Nothing is invoked or written unless the state names a plan file that
/// exists inside the working directory. A failed builder invocation still
/// persists the state without advancing `last_phase`.
pub async fn run_build(
    ctx: &PhaseContext,
    assistant: &dyn Assistant,
    mut state: WorkflowState,
) -> Result<BuildOutcome, WorkflowError> {
    let plan_rel = state
        .plan_file()
        .ok_or_else(|| WorkflowError::PlanFileUnset {
            run_id: state.run_id().clone(),
        })?
        .to_string();
    let plan_path = ctx
        .layout
        .resolve_existing_file(&plan_rel)
        .ok_or_else(|| WorkflowError::MissingPlanFile {
            path: plan_rel.clone(),
        })?;

    let implement_body = template::load(&ctx.layout, TemplateName::Implement)?;
    let plan_text = fs::read_to_string(&plan_path).map_err(|source| WorkflowError::Io {
        path: plan_path.clone(),
        source,
    })?;

    let run_id = state.run_id().clone();
    info!(run_id = %run_id, plan_file = plan_rel.as_str(), "building plan");

    let req = ctx.request(
        &run_id,
        Component::Builder,
        template::render(&implement_body, &plan_text),
    );
    let response = ctx
        .invoke_and_summarize(assistant, &req, |_| Some(plan_rel.clone()))
        .await;

    let phase = if response.success {
        Phase::Build
    } else {
        state.last_phase()
    };
    state.save(&ctx.layout, phase)?;

    Ok(BuildOutcome { state, response })
}
