//! Assistant invoker: run a backend CLI with retry and record its transcript.
//!
//! One [`Assistant::invoke`] call makes up to `max_attempts` attempts. Every
//! attempt appends to the same JSONL transcript, preceded by a marker line
//! `{"type":"agentic_attempt","attempt":n}`. Failures are returned as data in
//! the [`Response`]; nothing here touches workflow state.

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::harness::{
    AgentEvent, FailureKind, Harness, HarnessRegistry, ModelTier, Request, Response, Terminal,
};

/// Grace period between SIGTERM and SIGKILL for a timed-out child.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Lines of child stderr kept for failure messages.
const STDERR_TAIL_LINES: usize = 20;

/// How many times to try, how long to wait between tries, and how long one
/// try may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Per-attempt limit. `None` uses the model tier's default.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    /// Backoff before `attempt` (2-based): `base * 2^(attempt-2)`, capped at
    /// `max_delay`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    pub fn timeout_for(&self, tier: ModelTier) -> Duration {
        self.attempt_timeout
            .unwrap_or_else(|| tier.default_timeout())
    }
}

/// The seam between the phase drivers and whatever runs the assistant.
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn invoke(&self, request: &Request) -> Response;
}

/// Runs real assistant processes via the registered [`Harness`] adapters.
#[derive(Debug)]
pub struct Invoker {
    registry: HarnessRegistry,
    policy: RetryPolicy,
}

impl Invoker {
    pub fn new(registry: HarnessRegistry, policy: RetryPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl Assistant for Invoker {
    async fn invoke(&self, request: &Request) -> Response {
        let Some(harness) = self.registry.get(request.cli) else {
            return Response::failed(
                FailureKind::ProcessFailed,
                format!("no adapter registered for cli {}", request.cli),
                0,
            );
        };

        let mut transcript = match open_transcript(&request.output_path).await {
            Ok(file) => file,
            Err(e) => {
                return Response::failed(
                    FailureKind::ProcessFailed,
                    format!(
                        "cannot open transcript {}: {e}",
                        request.output_path.display()
                    ),
                    0,
                );
            }
        };

        let max_attempts = if request.single_attempt {
            1
        } else {
            self.policy.max_attempts.max(1)
        };
        let limit = self.policy.timeout_for(request.model);

        let mut attempt_no = 1;
        loop {
            info!(
                run_id = %request.run_id,
                component = %request.component,
                cli = %request.cli,
                model = harness.model_name(request.model),
                attempt = attempt_no,
                max_attempts,
                "invoking assistant"
            );

            if let Err(e) = write_object(
                &mut transcript,
                &json!({ "type": "agentic_attempt", "attempt": attempt_no }),
            )
            .await
            {
                warn!(error = %e, "failed to write attempt marker");
            }

            let attempt = run_attempt(harness, request, &mut transcript, limit).await;
            if let Err(e) = transcript.flush().await {
                warn!(error = %e, "failed to flush transcript");
            }

            let response = conclude(harness, &attempt, attempt_no);
            let Some(kind) = response.failure else {
                info!(attempt = attempt_no, "assistant succeeded");
                return response;
            };
            if !kind.is_retryable() || attempt_no >= max_attempts {
                warn!(
                    attempt = attempt_no,
                    failure = %kind,
                    error = response.error_message(),
                    "assistant failed"
                );
                return response;
            }

            let delay = self.policy.delay_before(attempt_no + 1);
            warn!(
                attempt = attempt_no,
                failure = %kind,
                error = response.error_message(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "assistant attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt_no += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// One attempt
// ---------------------------------------------------------------------------

/// What one attempt produced.
#[derive(Debug, Default)]
struct Attempt {
    /// Transcript objects recorded (excluding the attempt marker).
    objects: usize,
    events: Vec<AgentEvent>,
    terminal: Option<Terminal>,
    session_id: Option<String>,
    /// Why the process did not exit cleanly; `None` for exit status 0.
    process_error: Option<String>,
    stderr_tail: String,
}

async fn run_attempt(
    harness: &dyn Harness,
    request: &Request,
    transcript: &mut File,
    limit: Duration,
) -> Attempt {
    let mut attempt = Attempt::default();

    let mut cmd = Command::new(harness.binary());
    cmd.args(harness.args(request))
        .current_dir(&request.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            attempt.process_error = Some(format!(
                "failed to spawn '{}': {e} -- is it installed and on PATH?",
                harness.binary()
            ));
            return attempt;
        }
    };

    let stdout = child.stdout.take();
    let stderr_task = child
        .stderr
        .take()
        .map(|stderr| tokio::spawn(tail_lines(stderr, STDERR_TAIL_LINES)));

    let outcome = tokio::time::timeout(limit, async {
        if let Some(stdout) = stdout {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                if reader.read_until(b'\n', &mut buf).await? == 0 {
                    break;
                }
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                match harness.normalize_line(line) {
                    Some(value) => record(harness, &value, &mut attempt, transcript).await?,
                    None if !line.trim().is_empty() => {
                        debug!(line, "skipping stdout line that is not a transcript object");
                    }
                    None => {}
                }
            }
        }
        child.wait().await
    })
    .await;

    match outcome {
        Ok(Ok(status)) if status.success() => {}
        Ok(Ok(status)) => {
            attempt.process_error = Some(format!("'{}' exited with {status}", harness.binary()));
        }
        Ok(Err(e)) => {
            terminate(&mut child).await;
            attempt.process_error = Some(format!("I/O error while running assistant: {e}"));
        }
        Err(_) => {
            warn!(timeout_secs = limit.as_secs(), "assistant attempt timed out, killing it");
            terminate(&mut child).await;
            attempt.process_error = Some(format!("timed out after {}s", limit.as_secs()));
        }
    }

    if let Some(value) = harness.finish(&attempt.events, attempt.process_error.is_none()) {
        if let Err(e) = record(harness, &value, &mut attempt, transcript).await {
            warn!(error = %e, "failed to record synthesized result");
        }
    }

    if let Some(task) = stderr_task {
        if let Ok(Ok(tail)) = tokio::time::timeout(Duration::from_secs(2), task).await {
            attempt.stderr_tail = tail;
        }
    }

    attempt
}

/// Append one object to the transcript and fold its events into `attempt`.
async fn record(
    harness: &dyn Harness,
    value: &Value,
    attempt: &mut Attempt,
    transcript: &mut File,
) -> io::Result<()> {
    write_object(transcript, value).await?;
    attempt.objects += 1;

    for event in harness.interpret(value) {
        match &event {
            AgentEvent::Session { session_id } => {
                attempt.session_id = Some(session_id.clone());
            }
            AgentEvent::Result(terminal) => {
                if let Some(session_id) = &terminal.session_id {
                    attempt.session_id = Some(session_id.clone());
                }
                attempt.terminal = Some(terminal.clone());
            }
            AgentEvent::Error { message } => {
                debug!(message = message.as_str(), "assistant reported a stream error");
            }
            _ => {}
        }
        attempt.events.push(event);
    }
    Ok(())
}

/// Turn an attempt into a response.
fn conclude(harness: &dyn Harness, attempt: &Attempt, attempt_no: u32) -> Response {
    let with_stderr = |reason: &str| {
        if attempt.stderr_tail.is_empty() {
            reason.to_string()
        } else {
            format!("{reason}; stderr: {}", attempt.stderr_tail)
        }
    };

    let mut response = match (&attempt.terminal, &attempt.process_error) {
        (Some(terminal), _) if terminal.is_error => {
            let mut r = Response::failed(
                FailureKind::AssistantReportedError,
                terminal
                    .text
                    .clone()
                    .or_else(|| terminal.subtype.clone())
                    .unwrap_or_else(|| "assistant reported an error".to_string()),
                attempt_no,
            );
            r.output = harness.final_text(terminal, &attempt.events);
            r
        }
        (Some(terminal), None) => Response::succeeded(
            harness.final_text(terminal, &attempt.events),
            None,
            attempt_no,
        ),
        (_, Some(reason)) => {
            Response::failed(FailureKind::ProcessFailed, with_stderr(reason), attempt_no)
        }
        (None, None) if attempt.objects == 0 => Response::failed(
            FailureKind::TranscriptEmpty,
            with_stderr("assistant produced no transcript events"),
            attempt_no,
        ),
        (None, None) => Response::failed(
            FailureKind::TranscriptMalformed,
            "transcript ended without a terminal result event",
            attempt_no,
        ),
    };
    response.session_id = attempt.session_id.clone();
    for event in &attempt.events {
        response.usage.record(event);
    }
    response
}

// ---------------------------------------------------------------------------
// Process and file helpers
// ---------------------------------------------------------------------------

/// SIGTERM the child's process group, wait briefly, then SIGKILL.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            let pgid = -(pid as libc::pid_t);
            // SAFETY: the child was spawned as leader of its own process group.
            let ret = unsafe { libc::kill(pgid, libc::SIGTERM) };
            if ret != 0 {
                warn!(pid, "SIGTERM failed, proceeding to SIGKILL");
            }
            if let Ok(Ok(_)) = tokio::time::timeout(KILL_GRACE, child.wait()).await {
                debug!(pid, "process exited after SIGTERM");
                return;
            }
            debug!(pid, "process did not exit after SIGTERM, sending SIGKILL");
            // SAFETY: as above.
            unsafe { libc::kill(pgid, libc::SIGKILL) };
        }
    }
    let _ = child.kill().await;
}

/// Collect the last `keep` lines of a stream, joined with ` | `.
async fn tail_lines(stream: impl AsyncRead + Unpin, keep: usize) -> String {
    let mut lines = BufReader::new(stream).lines();
    let mut tail = VecDeque::with_capacity(keep);
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if tail.len() == keep {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join(" | ")
}

async fn open_transcript(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    File::create(path).await
}

async fn write_object(transcript: &mut File, value: &Value) -> io::Result<()> {
    let mut line = serde_json::to_string(value).map_err(io::Error::other)?;
    line.push('\n');
    transcript.write_all(line.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{ClaudeCodeAdapter, CopilotAdapter};

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
            attempt_timeout: None,
        };
        assert_eq!(policy.delay_before(2), Duration::from_secs(5));
        assert_eq!(policy.delay_before(3), Duration::from_secs(10));
        assert_eq!(policy.delay_before(4), Duration::from_secs(20));
        assert_eq!(policy.delay_before(5), Duration::from_secs(30));
        assert_eq!(policy.delay_before(60), Duration::from_secs(30));
    }

    #[test]
    fn timeout_defaults_to_tier() {
        let mut policy = RetryPolicy::default();
        assert_eq!(policy.timeout_for(ModelTier::Small), Duration::from_secs(600));
        policy.attempt_timeout = Some(Duration::from_secs(7));
        assert_eq!(policy.timeout_for(ModelTier::Large), Duration::from_secs(7));
    }

    fn terminal(is_error: bool, text: &str) -> Terminal {
        Terminal {
            is_error,
            text: Some(text.to_string()),
            session_id: Some("s-1".into()),
            subtype: None,
        }
    }

    #[test]
    fn clean_exit_with_success_result_succeeds() {
        let attempt = Attempt {
            objects: 2,
            terminal: Some(terminal(false, "done")),
            session_id: Some("s-1".into()),
            ..Attempt::default()
        };
        let r = conclude(&ClaudeCodeAdapter::new(), &attempt, 2);
        assert!(r.success);
        assert_eq!(r.output, "done");
        assert_eq!(r.session_id.as_deref(), Some("s-1"));
        assert_eq!(r.attempts, 2);
    }

    #[test]
    fn error_result_is_reported_error_even_on_bad_exit() {
        let attempt = Attempt {
            objects: 1,
            terminal: Some(terminal(true, "max turns reached")),
            process_error: Some("exited with 1".into()),
            ..Attempt::default()
        };
        let r = conclude(&ClaudeCodeAdapter::new(), &attempt, 1);
        assert_eq!(r.failure, Some(FailureKind::AssistantReportedError));
        assert_eq!(r.error.as_deref(), Some("max turns reached"));
    }

    #[test]
    fn success_result_with_nonzero_exit_is_process_failure() {
        let attempt = Attempt {
            objects: 1,
            terminal: Some(terminal(false, "done")),
            process_error: Some("exited with 3".into()),
            stderr_tail: "boom".into(),
            ..Attempt::default()
        };
        let r = conclude(&ClaudeCodeAdapter::new(), &attempt, 1);
        assert_eq!(r.failure, Some(FailureKind::ProcessFailed));
        assert_eq!(r.error.as_deref(), Some("exited with 3; stderr: boom"));
    }

    #[test]
    fn usage_is_totalled_from_events() {
        let attempt = Attempt {
            objects: 5,
            events: vec![
                AgentEvent::ToolCall {
                    tool: "Read".into(),
                    input: json!({"path": "a.rs"}),
                },
                AgentEvent::ToolResult {
                    tool: "Read".into(),
                    output: json!("fn main() {}"),
                },
                AgentEvent::TokenUsage {
                    input_tokens: 120,
                    output_tokens: 30,
                },
                AgentEvent::ToolCall {
                    tool: "Edit".into(),
                    input: json!({}),
                },
                AgentEvent::TokenUsage {
                    input_tokens: 80,
                    output_tokens: 12,
                },
            ],
            terminal: Some(terminal(false, "done")),
            ..Attempt::default()
        };
        let r = conclude(&ClaudeCodeAdapter::new(), &attempt, 1);
        assert_eq!(
            r.usage,
            crate::harness::Usage {
                input_tokens: 200,
                output_tokens: 42,
                tool_calls: 2,
                tool_results: 1,
            }
        );

        let failed = conclude(&ClaudeCodeAdapter::new(), &Attempt::default(), 1);
        assert_eq!(failed.usage, crate::harness::Usage::default());
    }

    #[test]
    fn empty_and_truncated_transcripts() {
        let empty = conclude(&ClaudeCodeAdapter::new(), &Attempt::default(), 1);
        assert_eq!(empty.failure, Some(FailureKind::TranscriptEmpty));

        let truncated = Attempt {
            objects: 3,
            ..Attempt::default()
        };
        let r = conclude(&CopilotAdapter::new(), &truncated, 1);
        assert_eq!(r.failure, Some(FailureKind::TranscriptMalformed));
    }

    #[tokio::test]
    async fn unregistered_cli_fails_without_spawning() {
        let tmp = tempfile::tempdir().unwrap();
        let invoker = Invoker::new(HarnessRegistry::new(), RetryPolicy::default());
        let request = Request {
            prompt: "p".into(),
            run_id: crate::id::RunId::parse("abcd1234").unwrap(),
            component: crate::layout::Component::Planner,
            model: ModelTier::Small,
            cli: crate::harness::CliKind::Gemini,
            bypass_permissions: false,
            output_path: tmp.path().join("out.jsonl"),
            working_dir: tmp.path().to_path_buf(),
            single_attempt: false,
        };
        let r = invoker.invoke(&request).await;
        assert_eq!(r.failure, Some(FailureKind::ProcessFailed));
        assert_eq!(r.attempts, 0);
        assert!(!request.output_path.exists());
    }

    #[tokio::test]
    async fn tail_keeps_last_lines() {
        let input: &[u8] = b"one\n\ntwo\nthree\n";
        assert_eq!(tail_lines(input, 2).await, "two | three");
    }
}
