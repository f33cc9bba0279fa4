//! Integration tests for the plan -> build handoff.
//!
//! The phase drivers run against a routing fake CLI that answers the
//! classifier, planner and builder prompts differently. Templates are kept
//! minimal so the fake can tell the phases apart by their first word.

use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use agentic_core::harness::{BackendBinaries, HarnessRegistry, Request, Response};
use agentic_core::phase::{PhaseContext, resolve_state, run_build, run_plan};
use agentic_core::state::PLAN_FILE_PROMPT;
use agentic_core::transcript::read_summary;
use agentic_core::{
    Assistant, Component, Invoker, Layout, Phase, RetryPolicy, RunId, StatePatch, TaskType,
    WorkflowError, WorkflowState,
};
use agentic_test_utils::{FakeCli, create_file, emit, succeed_with};

const PLAN_PATH: &str = "agentic/specs/260101-fix.md";

// ===========================================================================
// Helpers
// ===========================================================================

/// A working directory with minimal templates installed.
fn workspace() -> (tempfile::TempDir, Layout) {
    let tmp = tempfile::tempdir().unwrap();
    let layout = Layout::new(tmp.path().canonicalize().unwrap());
    let commands = layout.commands_dir();
    fs::create_dir_all(&commands).unwrap();
    fs::write(commands.join("classify.md"), "CLASSIFY: $ARGUMENTS").unwrap();
    fs::write(commands.join("plan.md"), "PLAN: $ARGUMENTS").unwrap();
    fs::write(commands.join("implement.md"), "IMPLEMENT: $ARGUMENTS").unwrap();
    (tmp, layout)
}

/// A fake that classifies as bugfix, writes the plan file, and builds.
fn scripted_assistant() -> FakeCli {
    let mut planner = create_file(PLAN_PATH, "PLAN");
    planner.push_str(&succeed_with(&format!(
        "I wrote the plan.\nPLAN_FILE: {PLAN_PATH}"
    )));
    FakeCli::routing(
        &[
            ("IMPLEMENT:", succeed_with("done")),
            ("CLASSIFY:", succeed_with("bugfix")),
            ("PLAN:", planner),
        ],
        &emit("unexpected prompt"),
    )
}

fn context(layout: &Layout) -> PhaseContext {
    PhaseContext::new(layout.clone())
}

fn invoker(fake: &FakeCli, max_attempts: u32) -> Invoker {
    let binaries = BackendBinaries {
        claude: fake.binary(),
        ..BackendBinaries::default()
    };
    Invoker::new(
        HarnessRegistry::with_defaults(&binaries),
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            attempt_timeout: Some(Duration::from_secs(20)),
        },
    )
}

fn write_plan(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

/// An in-memory assistant that answers every request with the same text.
struct CannedAssistant(&'static str);

#[async_trait]
impl Assistant for CannedAssistant {
    async fn invoke(&self, _request: &Request) -> Response {
        Response::succeeded(self.0, None, 1)
    }
}

/// Answers every request with the same text and records which component
/// each request was for.
struct RecordingAssistant {
    reply: &'static str,
    seen: Mutex<Vec<Component>>,
}

impl RecordingAssistant {
    fn new(reply: &'static str) -> Self {
        Self {
            reply,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<Component> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Assistant for RecordingAssistant {
    async fn invoke(&self, request: &Request) -> Response {
        self.seen.lock().unwrap().push(request.component);
        Response::succeeded(self.reply, None, 1)
    }
}

// ===========================================================================
// Plan then build via the piped state line
// ===========================================================================

#[tokio::test]
async fn plan_then_build_through_pipe() {
    let (_tmp, layout) = workspace();
    let fake = scripted_assistant();
    let ctx = context(&layout);
    let assistant = invoker(&fake, 3);

    let planned = run_plan(&ctx, &assistant, "fix the bug").await.unwrap();
    assert!(planned.response.success, "{:?}", planned.response);
    assert_eq!(planned.plan_file.as_deref(), Some(PLAN_PATH));

    let run_id = planned.state.run_id().clone();
    assert!(layout.run_dir(&run_id).is_dir());
    let on_disk = WorkflowState::load_required(&run_id, &layout).unwrap();
    assert_eq!(on_disk.task_type(), Some(TaskType::Bugfix));
    assert_eq!(on_disk.plan_file(), Some(PLAN_PATH));
    assert_eq!(on_disk.last_phase(), Phase::Plan);
    assert!(
        read_summary(&layout, &run_id, Component::Classifier)
            .unwrap()
            .is_some()
    );

    // What plan writes on a piped stdout is what build reads on stdin.
    let mut pipe = Vec::new();
    planned.state.to_writer(&mut pipe).unwrap();
    let state = resolve_state(&layout, None, None, || {
        WorkflowState::from_reader(pipe.as_slice())
    })
    .unwrap();
    assert_eq!(state.run_id(), &run_id);

    let built = run_build(&ctx, &assistant, state).await.unwrap();
    assert!(built.response.success);

    let summary = read_summary(&layout, &run_id, Component::Builder)
        .unwrap()
        .unwrap();
    assert!(summary.success);
    assert_eq!(summary.output, "done");
    assert_eq!(summary.plan_path.as_deref(), Some(PLAN_PATH));
    let after = WorkflowState::load_required(&run_id, &layout).unwrap();
    assert_eq!(after.last_phase(), Phase::Build);
    assert_eq!(after.task_type(), Some(TaskType::Bugfix));
}

// ===========================================================================
// Build from an explicit run id
// ===========================================================================

#[tokio::test]
async fn build_with_explicit_run_id() {
    let (_tmp, layout) = workspace();
    write_plan(layout.root(), "agentic/specs/a.md", "PLAN A");
    let run_id = RunId::parse("abcd1234").unwrap();
    let mut seeded = WorkflowState::new(run_id.clone(), "add a flag");
    seeded
        .update(
            StatePatch::default()
                .task_type(TaskType::Feature)
                .plan_file("agentic/specs/a.md"),
        )
        .unwrap();
    seeded.save(&layout, Phase::Plan).unwrap();

    let fake = scripted_assistant();
    let ctx = context(&layout);
    // Piped input must not be consulted when a run id is given.
    let state = resolve_state(&layout, Some(&run_id), None, || {
        panic!("stdin read despite --run-id")
    })
    .unwrap();
    let built = run_build(&ctx, &invoker(&fake, 1), state).await.unwrap();

    assert!(built.response.success);
    assert_eq!(built.state.run_id(), &run_id);
    let after = WorkflowState::load_required(&run_id, &layout).unwrap();
    assert_eq!(after.last_phase(), Phase::Build);
    assert_eq!(after.prompt(), "add a flag");
    assert_eq!(fake.spawns(), 1);
}

#[tokio::test]
async fn unknown_run_id_fails_without_creating_anything() {
    let (_tmp, layout) = workspace();
    let run_id = RunId::parse("deadbeef").unwrap();

    let err = resolve_state(&layout, Some(&run_id), None, || None).unwrap_err();

    assert_eq!(err.kind(), "state_not_found");
    assert!(err.to_string().contains("agentic/runs/deadbeef/state.json"));
    assert!(!layout.run_dir(&run_id).exists());
}

// ===========================================================================
// Build directly from a plan file
// ===========================================================================

#[tokio::test]
async fn build_from_plan_file_seeds_a_run() {
    let (_tmp, layout) = workspace();
    write_plan(layout.root(), "agentic/specs/x.md", "PLAN X");
    let fake = scripted_assistant();
    let ctx = context(&layout);

    let state = resolve_state(&layout, None, Some("agentic/specs/x.md"), || None).unwrap();
    let built = run_build(&ctx, &invoker(&fake, 1), state).await.unwrap();

    assert!(built.response.success);
    let run_id = built.state.run_id().clone();
    assert_eq!(run_id.as_str().len(), RunId::LEN);
    let after = WorkflowState::load_required(&run_id, &layout).unwrap();
    assert_eq!(after.prompt(), PLAN_FILE_PROMPT);
    assert_eq!(after.task_type(), Some(TaskType::Unknown));
    assert_eq!(after.plan_file(), Some("agentic/specs/x.md"));
    assert_eq!(after.last_phase(), Phase::Build);
}

#[tokio::test]
async fn absolute_plan_file_is_stored_relative() {
    let (_tmp, layout) = workspace();
    write_plan(layout.root(), "agentic/specs/x.md", "PLAN X");
    let absolute = layout.root().join("agentic/specs/x.md");

    let state = resolve_state(&layout, None, Some(&absolute.to_string_lossy()), || None).unwrap();

    assert_eq!(state.plan_file(), Some("agentic/specs/x.md"));
}

#[tokio::test]
async fn missing_plan_file_invokes_nothing() {
    let (_tmp, layout) = workspace();
    let fake = scripted_assistant();
    let ctx = context(&layout);

    let state = resolve_state(&layout, None, Some("agentic/specs/nope.md"), || None).unwrap();
    let run_id = state.run_id().clone();
    let err = run_build(&ctx, &invoker(&fake, 1), state).await.unwrap_err();

    assert!(matches!(err, WorkflowError::MissingPlanFile { .. }));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(fake.spawns(), 0);
    assert!(!layout.run_dir(&run_id).exists());
}

#[tokio::test]
async fn run_id_with_vanished_plan_file_leaves_state_untouched() {
    let (_tmp, layout) = workspace();
    let run_id = RunId::parse("abcd1234").unwrap();
    let mut seeded = WorkflowState::new(run_id.clone(), "fix the bug");
    seeded
        .update(
            StatePatch::default()
                .task_type(TaskType::Bugfix)
                .plan_file("agentic/specs/ghost.md"),
        )
        .unwrap();
    seeded.save(&layout, Phase::Plan).unwrap();
    let before = fs::read(layout.state_path(&run_id)).unwrap();

    let fake = scripted_assistant();
    let ctx = context(&layout);
    let state = resolve_state(&layout, Some(&run_id), None, || None).unwrap();
    let err = run_build(&ctx, &invoker(&fake, 1), state).await.unwrap_err();

    assert!(matches!(err, WorkflowError::MissingPlanFile { .. }));
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("agentic/specs/ghost.md"), "{err}");
    assert_eq!(fake.spawns(), 0);
    assert_eq!(fs::read(layout.state_path(&run_id)).unwrap(), before);
    assert!(!layout.run_dir(&run_id).join("builder").exists());
}

#[tokio::test]
async fn no_state_source_is_usage_error() {
    let (_tmp, layout) = workspace();
    let err = resolve_state(&layout, None, None, || None).unwrap_err();
    assert_eq!(err.kind(), "bad_arguments");
    assert!(err.to_string().contains("--plan-file"));
}

// ===========================================================================
// Failure paths
// ===========================================================================

#[tokio::test]
async fn failed_planner_persists_state_without_advancing() {
    let (_tmp, layout) = workspace();
    let fake = FakeCli::routing(
        &[("CLASSIFY:", succeed_with("feature"))],
        "echo 'planner crashed' >&2\nexit 1\n",
    );
    let ctx = context(&layout);

    let outcome = run_plan(&ctx, &invoker(&fake, 2), "add a flag").await.unwrap();

    assert!(!outcome.response.success);
    assert_eq!(outcome.response.attempts, 2);
    let error = WorkflowError::from_response(&outcome.response).unwrap();
    assert_eq!(error.exit_code(), 1);

    let on_disk = WorkflowState::load_required(outcome.state.run_id(), &layout).unwrap();
    assert_eq!(on_disk.last_phase(), Phase::Created);
    assert_eq!(on_disk.task_type(), Some(TaskType::Feature));
    assert_eq!(on_disk.plan_file(), None);

    let summary = read_summary(&layout, outcome.state.run_id(), Component::Planner)
        .unwrap()
        .unwrap();
    assert!(!summary.success);
    assert!(summary.error.unwrap().contains("planner crashed"));
}

#[tokio::test]
async fn failed_classifier_records_unknown() {
    let (_tmp, layout) = workspace();
    let mut planner = create_file(PLAN_PATH, "PLAN");
    planner.push_str(&succeed_with(&format!("PLAN_FILE: {PLAN_PATH}")));
    let fake = FakeCli::routing(&[("PLAN:", planner)], "exit 1\n");
    let ctx = context(&layout);

    let outcome = run_plan(&ctx, &invoker(&fake, 3), "do something").await.unwrap();

    assert!(outcome.response.success);
    assert_eq!(outcome.state.task_type(), Some(TaskType::Unknown));
    assert_eq!(outcome.state.plan_file(), Some(PLAN_PATH));
    // One classifier attempt despite the retry policy, then one planner run.
    assert_eq!(fake.spawns(), 2);
}

#[tokio::test]
async fn empty_request_skips_classifier_but_still_plans() {
    let (_tmp, layout) = workspace();
    let ctx = context(&layout);
    let assistant = RecordingAssistant::new("nothing to plan");

    let outcome = run_plan(&ctx, &assistant, "").await.unwrap();

    assert_eq!(assistant.seen(), vec![Component::Planner]);
    assert!(outcome.response.success);
    assert_eq!(outcome.state.task_type(), Some(TaskType::Unknown));
    assert_eq!(outcome.state.last_phase(), Phase::Plan);

    let on_disk = WorkflowState::load_required(outcome.state.run_id(), &layout).unwrap();
    assert_eq!(on_disk.prompt(), "");
    assert_eq!(on_disk.task_type(), Some(TaskType::Unknown));
    assert!(
        read_summary(&layout, outcome.state.run_id(), Component::Classifier)
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn plan_without_extractable_path_still_succeeds() {
    let (_tmp, layout) = workspace();
    let ctx = context(&layout);

    let outcome = run_plan(&ctx, &CannedAssistant("research\nno file written"), "look into it")
        .await
        .unwrap();

    assert!(outcome.response.success);
    assert_eq!(outcome.plan_file, None);
    assert_eq!(outcome.state.task_type(), Some(TaskType::Research));
    assert_eq!(outcome.state.last_phase(), Phase::Plan);

    let err = run_build(&ctx, &CannedAssistant("done"), outcome.state)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PlanFileUnset { .. }));
}

#[tokio::test]
async fn missing_template_leaves_no_run() {
    let (_tmp, layout) = workspace();
    fs::remove_file(layout.commands_dir().join("plan.md")).unwrap();
    let ctx = context(&layout);

    let err = run_plan(&ctx, &CannedAssistant("bugfix"), "fix it")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "missing_template");
    assert!(!layout.runs_dir().exists());
}
