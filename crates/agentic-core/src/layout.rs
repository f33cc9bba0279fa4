//! On-disk layout of the `agentic/` tree under a working directory.
//!
//! ```text
//! <working-dir>/agentic/
//!   commands/            # prompt templates
//!   specs/               # plan documents written by the assistant
//!   runs/<run_id>/
//!     state.json
//!     classifier/{cli_raw_output.jsonl, cli_summary_output.json}
//!     planner/{cli_raw_output.jsonl, cli_summary_output.json}
//!     builder/{cli_raw_output.jsonl, cli_summary_output.json}
//! ```

use std::fmt;
use std::path::{Component as PathComponent, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::id::RunId;

pub const AGENTIC_DIR: &str = "agentic";
pub const STATE_FILE: &str = "state.json";
pub const RAW_TRANSCRIPT_FILE: &str = "cli_raw_output.jsonl";
pub const SUMMARY_FILE: &str = "cli_summary_output.json";

/// The part of a run that invoked the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Classifier,
    Planner,
    Builder,
}

impl Component {
    pub const ALL: [Self; 3] = [Self::Classifier, Self::Planner, Self::Builder];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classifier => "classifier",
            Self::Planner => "planner",
            Self::Builder => "builder",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path arithmetic for one working directory.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: working_dir.into(),
        }
    }

    /// The working directory itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn agentic_dir(&self) -> PathBuf {
        self.root.join(AGENTIC_DIR)
    }

    pub fn commands_dir(&self) -> PathBuf {
        self.agentic_dir().join("commands")
    }

    pub fn specs_dir(&self) -> PathBuf {
        self.agentic_dir().join("specs")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.agentic_dir().join("runs")
    }

    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.runs_dir().join(run_id.as_str())
    }

    pub fn state_path(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join(STATE_FILE)
    }

    pub fn component_dir(&self, run_id: &RunId, component: Component) -> PathBuf {
        self.run_dir(run_id).join(component.as_str())
    }

    pub fn raw_transcript_path(&self, run_id: &RunId, component: Component) -> PathBuf {
        self.component_dir(run_id, component).join(RAW_TRANSCRIPT_FILE)
    }

    pub fn summary_path(&self, run_id: &RunId, component: Component) -> PathBuf {
        self.component_dir(run_id, component).join(SUMMARY_FILE)
    }

    /// Express `path` relative to the working directory when it points
    /// inside it. Relative input is returned with `.` components dropped.
    pub fn relativize(&self, path: &str) -> String {
        let candidate = Path::new(path);
        let relative = if candidate.is_absolute() {
            match candidate.strip_prefix(&self.root) {
                Ok(rest) => rest,
                Err(_) => return path.to_owned(),
            }
        } else {
            candidate
        };
        let cleaned: PathBuf = relative
            .components()
            .filter(|c| !matches!(c, PathComponent::CurDir))
            .collect();
        cleaned.to_string_lossy().into_owned()
    }

    /// Resolve a working-directory-relative file path and confirm it is an
    /// existing file that does not escape the working directory.
    ///
    /// Returns `None` when the file is missing or lies outside the root.
    pub fn resolve_existing_file(&self, relative: &str) -> Option<PathBuf> {
        let joined = self.root.join(relative);
        let canonical = joined.canonicalize().ok()?;
        let root = self.root.canonicalize().ok()?;
        (canonical.starts_with(&root) && canonical.is_file()).then_some(joined)
    }
}
