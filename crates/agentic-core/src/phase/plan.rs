//! The plan phase: seed a run and have the assistant write a plan document.

use tracing::{info, warn};

use super::{PhaseContext, classify};
use crate::error::WorkflowError;
use crate::extract::extract_plan_path;
use crate::harness::Response;
use crate::id::RunId;
use crate::invoker::Assistant;
use crate::layout::Component;
use crate::state::{Phase, StatePatch, WorkflowState};
use crate::template::{self, TemplateName};

/// What the plan phase produced. The state has already been persisted.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub state: WorkflowState,
    pub response: Response,
    /// The plan path found in the planner's output, if any.
    pub plan_file: Option<String>,
}

/// Run the plan phase for `request` in a fresh run directory.
///
/// Templates are read before anything is written, so a missing template
/// leaves no trace. A failed planner invocation still persists the state
/// (without advancing `last_phase`); the caller decides the exit code from
/// `outcome.response`.
pub async fn run_plan(
    ctx: &PhaseContext,
    assistant: &dyn Assistant,
    request: &str,
) -> Result<PlanOutcome, WorkflowError> {
    let classify_body = classify::load_template(ctx)?;
    let plan_body = template::load(&ctx.layout, TemplateName::Plan)?;

    let run_id = RunId::generate_unused(&ctx.layout.runs_dir());
    let mut state = WorkflowState::new(run_id.clone(), request);
    state.save(&ctx.layout, Phase::Created)?;
    info!(run_id = %run_id, cli = %ctx.cli, model = %ctx.model, "run created");

    let task_type = classify::classify(ctx, assistant, &run_id, &classify_body, request).await;
    state.update(StatePatch::default().task_type(task_type))?;

    let req = ctx.request(
        &run_id,
        Component::Planner,
        template::render(&plan_body, request),
    );
    let mut plan_file = None;
    let response = ctx
        .invoke_and_summarize(assistant, &req, |r| {
            if r.success {
                plan_file = extract_plan_path(&r.output, &ctx.layout);
            }
            plan_file.clone()
        })
        .await;

    if response.success {
        match &plan_file {
            Some(path) => {
                info!(run_id = %run_id, plan_file = path.as_str(), "plan written");
                state.update(StatePatch::default().plan_file(path.as_str()))?;
            }
            None => warn!(
                run_id = %run_id,
                "no plan file found in planner output; build will refuse this run"
            ),
        }
        state.save(&ctx.layout, Phase::Plan)?;
    } else {
        let current = state.last_phase();
        state.save(&ctx.layout, current)?;
    }

    Ok(PlanOutcome {
        state,
        response,
        plan_file,
    })
}
