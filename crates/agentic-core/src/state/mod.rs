//! Workflow state: the record that links the plan phase to the build phase.
//!
//! The record is persisted as `agentic/runs/<run_id>/state.json` (see
//! [`store`]) and can travel between processes as a single JSON line (see
//! [`pipe`]). Mutation goes through [`WorkflowState::update`] with a typed
//! [`StatePatch`]; there is no way to change `run_id` after creation, and
//! `last_phase` only moves forward:
//!
//! ```text
//! created -> plan -> build
//! ```

pub mod pipe;
pub mod store;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::RunId;

/// Prompt recorded for runs seeded directly from a plan file.
pub const PLAN_FILE_PROMPT: &str = "(from plan file)";

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Classification of the user's request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Feature,
    Bugfix,
    Refactor,
    Research,
    Unknown,
}

impl TaskType {
    /// The four concrete classifications, in the order the classifier
    /// output is scanned.
    pub const CLASSIFIED: [Self; 4] = [Self::Feature, Self::Bugfix, Self::Refactor, Self::Research];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Bugfix => "bugfix",
            Self::Refactor => "refactor",
            Self::Research => "research",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feature" => Ok(Self::Feature),
            "bugfix" => Ok(Self::Bugfix),
            "refactor" => Ok(Self::Refactor),
            "research" => Ok(Self::Research),
            "unknown" => Ok(Self::Unknown),
            other => Err(ParseEnumError::new("task type", other)),
        }
    }
}

/// Last phase a run completed.
///
/// Variants are declared in lifecycle order so the derived `Ord` matches
/// the allowed direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Created,
    Plan,
    Build,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Plan => "plan",
            Self::Build => "build",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "plan" => Ok(Self::Plan),
            "build" => Ok(Self::Build),
            other => Err(ParseEnumError::new("phase", other)),
        }
    }
}

/// Error returned when parsing an invalid enum string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {what}: {value:?}")]
pub struct ParseEnumError {
    pub what: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from state transitions and state persistence.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("no state for run {run_id}: expected {}", path.display())]
    NotFound { run_id: RunId, path: PathBuf },

    #[error("state file {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `state.json` names a different run than the directory it lives in.
    #[error("state file {} belongs to run {found}, not {expected}", path.display())]
    RunIdMismatch {
        path: PathBuf,
        expected: RunId,
        found: RunId,
    },

    #[error("cannot move last_phase backwards from {from} to {to}")]
    PhaseRegression { from: Phase, to: Phase },

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// State record
// ---------------------------------------------------------------------------

/// The per-run record.
///
/// Fields are private: reads go through accessors, writes through
/// [`WorkflowState::update`]. Unknown fields in persisted or piped JSON are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    run_id: RunId,
    prompt: String,
    #[serde(default)]
    task_type: Option<TaskType>,
    #[serde(default)]
    plan_file: Option<String>,
    last_phase: Phase,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// A narrow patch over the mutable fields of a [`WorkflowState`].
///
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePatch {
    pub task_type: Option<TaskType>,
    pub plan_file: Option<String>,
    pub last_phase: Option<Phase>,
}

impl StatePatch {
    pub fn task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    pub fn plan_file(mut self, plan_file: impl Into<String>) -> Self {
        self.plan_file = Some(plan_file.into());
        self
    }

    pub fn last_phase(mut self, phase: Phase) -> Self {
        self.last_phase = Some(phase);
        self
    }
}

impl WorkflowState {
    /// A fresh record with `last_phase = created`.
    pub fn new(run_id: RunId, prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            prompt: prompt.into(),
            task_type: None,
            plan_file: None,
            last_phase: Phase::Created,
            created_at: now,
            updated_at: now,
        }
    }

    /// A record seeded from an existing plan document, skipping the plan
    /// phase entirely.
    pub fn from_plan_file(run_id: RunId, plan_file: impl Into<String>) -> Self {
        let mut state = Self::new(run_id, PLAN_FILE_PROMPT);
        state.task_type = Some(TaskType::Unknown);
        state.plan_file = Some(plan_file.into());
        state
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn task_type(&self) -> Option<TaskType> {
        self.task_type
    }

    /// The plan path, treating an empty string as unset.
    pub fn plan_file(&self) -> Option<&str> {
        self.plan_file.as_deref().filter(|p| !p.trim().is_empty())
    }

    pub fn last_phase(&self) -> Phase {
        self.last_phase
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether `last_phase` may move from `from` to `to`.
    ///
    /// Re-running a phase (`to == from`) is allowed; moving backwards is not.
    pub fn is_valid_transition(from: Phase, to: Phase) -> bool {
        to >= from
    }

    /// Apply a patch. The patch is validated as a whole before any field
    /// changes, so a rejected patch leaves the record untouched.
    pub fn update(&mut self, patch: StatePatch) -> Result<(), StateError> {
        if let Some(to) = patch.last_phase {
            if !Self::is_valid_transition(self.last_phase, to) {
                return Err(StateError::PhaseRegression {
                    from: self.last_phase,
                    to,
                });
            }
        }

        if let Some(task_type) = patch.task_type {
            self.task_type = Some(task_type);
        }
        if let Some(plan_file) = patch.plan_file {
            self.plan_file = Some(plan_file);
        }
        if let Some(phase) = patch.last_phase {
            self.last_phase = phase;
        }
        Ok(())
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
