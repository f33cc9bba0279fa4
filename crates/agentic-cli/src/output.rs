//! Terminal vs. pipe output for the phase commands.
//!
//! When stdout is a pipe it carries exactly one JSON state line for the next
//! phase, and everything human-readable goes to stderr. When stdout is a
//! terminal it gets the human-readable summary and no JSON.

use std::io::{self, IsTerminal, Write};

use agentic_core::WorkflowState;

/// Where the state record should go for the current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdoutMode {
    Terminal,
    Pipe,
}

impl StdoutMode {
    pub fn detect() -> Self {
        if io::stdout().is_terminal() {
            Self::Terminal
        } else {
            Self::Pipe
        }
    }
}

/// Emit the final state of a phase.
///
/// `summary` is the human-readable rendering; it goes to `out` on a terminal
/// and to `err` when piping.
pub fn emit_state(
    state: &WorkflowState,
    summary: &str,
    mode: StdoutMode,
    mut out: impl Write,
    mut err: impl Write,
) -> io::Result<()> {
    match mode {
        StdoutMode::Pipe => {
            state.to_writer(&mut out)?;
            writeln!(err, "{summary}")?;
            err.flush()
        }
        StdoutMode::Terminal => {
            writeln!(out, "{summary}")?;
            out.flush()
        }
    }
}

/// Emit to the real stdout and stderr.
pub fn emit_state_stdio(state: &WorkflowState, summary: &str) -> io::Result<()> {
    emit_state(
        state,
        summary,
        StdoutMode::detect(),
        io::stdout().lock(),
        io::stderr().lock(),
    )
}

/// Multi-line human summary of a run's state.
pub fn describe_state(state: &WorkflowState) -> String {
    let task_type = state
        .task_type()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "Run:       {}\nPhase:     {}\nTask type: {}\nPlan file: {}\nPrompt:    {}",
        state.run_id(),
        state.last_phase(),
        task_type,
        state.plan_file().unwrap_or("-"),
        state.prompt(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentic_core::{RunId, StatePatch, TaskType};

    fn sample_state() -> WorkflowState {
        let mut state = WorkflowState::new(RunId::parse("abcd1234").unwrap(), "fix the bug");
        state
            .update(
                StatePatch::default()
                    .task_type(TaskType::Bugfix)
                    .plan_file("agentic/specs/260101-fix.md"),
            )
            .unwrap();
        state
    }

    #[test]
    fn pipe_mode_writes_one_json_line_to_stdout() {
        let state = sample_state();
        let mut out = Vec::new();
        let mut err = Vec::new();
        emit_state(&state, "summary", StdoutMode::Pipe, &mut out, &mut err).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.ends_with('\n'));
        assert_eq!(out.lines().count(), 1);
        let parsed: WorkflowState = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(parsed, state);
        assert_eq!(String::from_utf8(err).unwrap(), "summary\n");
    }

    #[test]
    fn terminal_mode_writes_no_json() {
        let state = sample_state();
        let mut out = Vec::new();
        let mut err = Vec::new();
        emit_state(&state, "summary", StdoutMode::Terminal, &mut out, &mut err).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "summary\n");
        assert!(err.is_empty());
    }

    #[test]
    fn describe_state_shows_gaps() {
        let state = WorkflowState::new(RunId::parse("abcd1234").unwrap(), "p");
        let text = describe_state(&state);
        assert!(text.contains("Run:       abcd1234"));
        assert!(text.contains("Task type: -"));
        assert!(text.contains("Plan file: -"));
    }
}
