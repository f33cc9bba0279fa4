//! One-line JSON handoff of [`WorkflowState`] between processes.
//!
//! `agentic plan … | agentic build` works by the plan process writing its
//! state as exactly one line of JSON on stdout and the build process reading
//! exactly one such line from stdin. Extra lines are ignored.

use std::io::{self, BufRead, IsTerminal, Write};

use tracing::{debug, warn};

use super::WorkflowState;

impl WorkflowState {
    /// Read a piped state record from `reader`.
    ///
    /// Blank lines before the record are skipped. Only the first non-blank
    /// line is considered; if it is not a valid state record the result is
    /// `None`.
    pub fn from_reader(reader: impl BufRead) -> Option<Self> {
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "failed to read piped state");
                    return None;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return match serde_json::from_str::<Self>(trimmed) {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!(error = %e, "ignoring piped input that is not a state record");
                    None
                }
            };
        }
        None
    }

    /// Read a piped state record from the process's stdin.
    ///
    /// Returns `None` immediately when stdin is a terminal.
    pub fn from_stdin() -> Option<Self> {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            debug!("stdin is a terminal, not reading piped state");
            return None;
        }
        Self::from_reader(stdin.lock())
    }

    /// Write the record as one JSON line terminated by `\n`.
    pub fn to_writer(&self, mut writer: impl Write) -> io::Result<()> {
        let line = serde_json::to_string(self).map_err(io::Error::other)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    /// Write the record as one JSON line on stdout.
    pub fn to_stdout(&self) -> io::Result<()> {
        self.to_writer(io::stdout().lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::RunId;
    use crate::state::{Phase, StatePatch, TaskType};

    fn sample() -> WorkflowState {
        let mut state = WorkflowState::new(RunId::parse("abcd1234").unwrap(), "fix the bug");
        state
            .update(
                StatePatch::default()
                    .task_type(TaskType::Bugfix)
                    .plan_file("agentic/specs/260101-fix.md")
                    .last_phase(Phase::Plan),
            )
            .unwrap();
        state
    }

    #[test]
    fn writer_emits_exactly_one_line() {
        let mut buf = Vec::new();
        sample().to_writer(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn writer_output_reads_back() {
        let state = sample();
        let mut buf = Vec::new();
        state.to_writer(&mut buf).unwrap();
        let back = WorkflowState::from_reader(buf.as_slice()).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn reader_ignores_extra_lines_and_leading_blanks() {
        let state = sample();
        let mut buf = b"\n  \n".to_vec();
        state.to_writer(&mut buf).unwrap();
        buf.extend_from_slice(b"trailing garbage\n{\"also\":\"ignored\"}\n");
        let back = WorkflowState::from_reader(buf.as_slice()).unwrap();
        assert_eq!(back.run_id().as_str(), "abcd1234");
    }

    #[test]
    fn reader_rejects_non_state_input() {
        assert!(WorkflowState::from_reader("hello world\n".as_bytes()).is_none());
        assert!(WorkflowState::from_reader(r#"{"run_id":"x"}"#.as_bytes()).is_none());
        assert!(WorkflowState::from_reader("".as_bytes()).is_none());
    }

    #[test]
    fn reader_drops_unknown_fields() {
        let json = r#"{"run_id":"abcd1234","prompt":"p","task_type":"feature","plan_file":null,"last_phase":"plan","created_at":"2026-01-01T00:00:00Z","updated_at":"2026-01-01T00:00:00Z","extra":1}"#;
        let state = WorkflowState::from_reader(json.as_bytes()).unwrap();
        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("extra").is_none());
        assert_eq!(state.task_type(), Some(TaskType::Feature));
    }
}
