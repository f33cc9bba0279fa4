//! Persistence of [`WorkflowState`] under `agentic/runs/<run_id>/state.json`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{Phase, StateError, StatePatch, WorkflowState};
use crate::id::RunId;
use crate::layout::Layout;

impl WorkflowState {
    /// Advance `last_phase` to `phase`, stamp `updated_at`, and replace
    /// `state.json` atomically. Creates the run directory as needed.
    ///
    /// Returns the path written.
    pub fn save(&mut self, layout: &Layout, phase: Phase) -> Result<PathBuf, StateError> {
        self.update(StatePatch::default().last_phase(phase))?;
        self.touch();

        let path = layout.state_path(self.run_id());
        let body = serde_json::to_string_pretty(self)?;
        atomic_write(&path, body.as_bytes())?;

        debug!(
            run_id = %self.run_id(),
            phase = %self.last_phase(),
            path = %path.display(),
            "state saved"
        );
        Ok(path)
    }

    /// Read the persisted state for `run_id`.
    ///
    /// Returns `Ok(None)` when no `state.json` exists. A file that exists
    /// but does not parse is [`StateError::Corrupt`]; one recording a
    /// different run is [`StateError::RunIdMismatch`].
    pub fn load(run_id: &RunId, layout: &Layout) -> Result<Option<Self>, StateError> {
        let path = layout.state_path(run_id);
        let body = match fs::read_to_string(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StateError::Io { path, source }),
        };
        let state: Self =
            serde_json::from_str(&body).map_err(|source| StateError::Corrupt {
                path: path.clone(),
                source,
            })?;
        if state.run_id() != run_id {
            return Err(StateError::RunIdMismatch {
                path,
                expected: run_id.clone(),
                found: state.run_id().clone(),
            });
        }
        Ok(Some(state))
    }

    /// Like [`WorkflowState::load`], but a missing file is
    /// [`StateError::NotFound`] naming the expected path.
    pub fn load_required(run_id: &RunId, layout: &Layout) -> Result<Self, StateError> {
        Self::load(run_id, layout)?.ok_or_else(|| StateError::NotFound {
            run_id: run_id.clone(),
            path: layout.state_path(run_id),
        })
    }
}

/// Load every run under `agentic/runs/`, most recently updated first.
///
/// Directories without a readable `state.json` are skipped with a warning.
pub fn list_runs(layout: &Layout) -> Result<Vec<WorkflowState>, StateError> {
    let runs_dir = layout.runs_dir();
    let entries = match fs::read_dir(&runs_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StateError::Io {
                path: runs_dir,
                source,
            });
        }
    };

    let mut runs = Vec::new();
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Ok(run_id) = RunId::parse(&name.to_string_lossy()) else {
            continue;
        };
        match WorkflowState::load(&run_id, layout) {
            Ok(Some(state)) => runs.push(state),
            Ok(None) => {}
            Err(e) => warn!(run_id = %run_id, error = %e, "skipping unreadable run"),
        }
    }
    runs.sort_by(|a, b| b.updated_at().cmp(&a.updated_at()));
    Ok(runs)
}

/// Write `data` to a `.tmp` sibling, flush it to disk, then rename it over
/// `path`. Readers see either the old file or the new one.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StateError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| StateError::Io { path, source }
    };

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(io_err(dir))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut file = fs::File::create(&tmp).map_err(io_err(&tmp))?;
    file.write_all(data).map_err(io_err(&tmp))?;
    file.write_all(b"\n").map_err(io_err(&tmp))?;
    file.sync_all().map_err(io_err(&tmp))?;
    drop(file);

    fs::rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}
