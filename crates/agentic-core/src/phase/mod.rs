//! Plan and build phase drivers.
//!
//! ```text
//! plan:  seed state -> classify -> plan template -> assistant -> extract path -> save(plan)
//! build: resolve state -> verify plan file -> implement template -> assistant -> save(build)
//! ```
//!
//! Drivers talk to the assistant only through the [`Assistant`] trait and
//! return the final state; printing and exit codes belong to the CLI.

pub mod build;
pub mod classify;
pub mod plan;

pub use build::{BuildOutcome, resolve_state, run_build};
pub use classify::{classify, parse_task_type};
pub use plan::{PlanOutcome, run_plan};

use crate::harness::{CliKind, ModelTier, Request, Response};
use crate::id::RunId;
use crate::invoker::Assistant;
use crate::layout::{Component, Layout};
use crate::transcript::{Summary, write_summary};

/// Settings shared by every assistant call in one phase.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub layout: Layout,
    pub model: ModelTier,
    pub cli: CliKind,
    pub bypass_permissions: bool,
}

impl PhaseContext {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            model: ModelTier::default(),
            cli: CliKind::default(),
            bypass_permissions: true,
        }
    }

    fn request(&self, run_id: &RunId, component: Component, prompt: String) -> Request {
        Request {
            prompt,
            run_id: run_id.clone(),
            component,
            model: self.model,
            cli: self.cli,
            bypass_permissions: self.bypass_permissions,
            output_path: self.layout.raw_transcript_path(run_id, component),
            working_dir: self.layout.root().to_path_buf(),
            single_attempt: false,
        }
    }

    /// Invoke the assistant for `component` and write its summary file.
    async fn invoke_and_summarize(
        &self,
        assistant: &dyn Assistant,
        request: &Request,
        plan_path: impl FnOnce(&Response) -> Option<String>,
    ) -> Response {
        let response = assistant.invoke(request).await;
        let summary = Summary::new(
            request.component,
            request.run_id.clone(),
            request.cli,
            request.model,
            plan_path(&response),
            &response,
        );
        if let Err(e) = write_summary(&self.layout, &summary) {
            tracing::warn!(
                component = %request.component,
                error = %e,
                "failed to write summary file"
            );
        }
        response
    }
}
