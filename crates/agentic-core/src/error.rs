//! Errors surfaced by the phase drivers.

use std::path::PathBuf;

use crate::harness::{FailureKind, Response};
use crate::id::RunId;
use crate::state::StateError;
use crate::template::TemplateError;

/// Every way a phase can stop short of a successful assistant run.
///
/// Assistant failures travel as data inside a
/// [`Response`](crate::harness::Response) until state has been persisted;
/// only then does a driver turn them into [`WorkflowError::AssistantFailed`].
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("run {run_id} has no plan_file; run `agentic plan` first or pass --plan-file")]
    PlanFileUnset { run_id: RunId },

    #[error("plan file not found in working directory: {path}")]
    MissingPlanFile { path: String },

    #[error(transparent)]
    State(StateError),

    #[error("{0}")]
    BadArguments(String),

    #[error("assistant failed ({kind}): {message}")]
    AssistantFailed { kind: FailureKind, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<StateError> for WorkflowError {
    fn from(err: StateError) -> Self {
        Self::State(err)
    }
}

impl WorkflowError {
    /// The error for a failed assistant response, `None` on success.
    pub fn from_response(response: &Response) -> Option<Self> {
        let kind = response.failure?;
        Some(Self::AssistantFailed {
            kind,
            message: response.error_message().to_string(),
        })
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Template(_) => "missing_template",
            Self::PlanFileUnset { .. } | Self::MissingPlanFile { .. } => "missing_plan_file",
            Self::State(StateError::NotFound { .. }) => "state_not_found",
            Self::State(StateError::Corrupt { .. } | StateError::RunIdMismatch { .. }) => {
                "state_corrupt"
            }
            Self::State(StateError::PhaseRegression { .. }) => "phase_regression",
            Self::State(StateError::Serialize(_) | StateError::Io { .. }) | Self::Io { .. } => {
                "io"
            }
            Self::BadArguments(_) => "bad_arguments",
            Self::AssistantFailed { .. } => "assistant_failed",
        }
    }

    /// Process exit code: 1 for assistant failures, 2 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AssistantFailed { .. } => 1,
            _ => 2,
        }
    }
}
