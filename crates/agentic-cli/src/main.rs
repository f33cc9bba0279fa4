mod build_cmd;
mod config;
mod init_cmd;
mod output;
mod plan_cmd;
mod status_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

use agentic_core::harness::{CliKind, ModelTier};
use agentic_core::phase::PhaseContext;
use agentic_core::{Layout, WorkflowError};

#[derive(Parser)]
#[command(
    name = "agentic",
    version,
    about = "Plan-then-build workflow driver for coding-assistant CLIs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a request and have the assistant write a plan document
    Plan {
        /// What to build or fix (free text)
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,
        #[command(flatten)]
        assistant: AssistantArgs,
    },
    /// Have the assistant implement a plan
    ///
    /// State comes from --run-id, else a state line piped on stdin, else
    /// --plan-file.
    Build {
        /// Existing run to build
        #[arg(long)]
        run_id: Option<String>,
        /// Plan document to build directly, starting a new run
        #[arg(long)]
        plan_file: Option<String>,
        #[command(flatten)]
        assistant: AssistantArgs,
    },
    /// Write the default prompt templates into agentic/commands/
    Init {
        /// Project directory (defaults to the current directory)
        #[arg(long)]
        working_dir: Option<PathBuf>,
        /// Overwrite existing templates
        #[arg(long)]
        force: bool,
    },
    /// List runs, or show one run's state and phase outcomes
    Status {
        /// Run to show (omit to list all runs)
        run_id: Option<String>,
        /// Project directory (defaults to the current directory)
        #[arg(long)]
        working_dir: Option<PathBuf>,
    },
}

/// Options shared by the phases that invoke an assistant.
#[derive(Args, Debug, Clone)]
pub struct AssistantArgs {
    /// Model tier
    #[arg(long, value_enum, default_value_t = ModelArg::Large)]
    model: ModelArg,
    /// Project directory (defaults to the current directory)
    #[arg(long)]
    working_dir: Option<PathBuf>,
    /// Assistant CLI to drive
    #[arg(long, value_enum, default_value_t = CliArg::Claude)]
    cli: CliArg,
    /// Maximum attempts per invocation (overrides AGENTIC_MAX_ATTEMPTS and the config file)
    #[arg(long)]
    max_attempts: Option<u32>,
    /// Do not pass the backend's permission-bypass flag
    #[arg(long)]
    no_skip_permissions: bool,
}

impl AssistantArgs {
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Build the phase context rooted at the resolved working directory.
    pub fn phase_context(&self) -> anyhow::Result<PhaseContext> {
        let layout = Layout::new(resolve_working_dir(self.working_dir.clone())?);
        let mut ctx = PhaseContext::new(layout);
        ctx.model = self.model.to_domain();
        ctx.cli = self.cli.to_domain();
        ctx.bypass_permissions = !self.no_skip_permissions;
        Ok(ctx)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModelArg {
    Small,
    Medium,
    Large,
}

impl ModelArg {
    fn to_domain(self) -> ModelTier {
        match self {
            Self::Small => ModelTier::Small,
            Self::Medium => ModelTier::Medium,
            Self::Large => ModelTier::Large,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CliArg {
    Claude,
    Copilot,
    Gemini,
}

impl CliArg {
    fn to_domain(self) -> CliKind {
        match self {
            Self::Claude => CliKind::Claude,
            Self::Copilot => CliKind::Copilot,
            Self::Gemini => CliKind::Gemini,
        }
    }
}

/// Canonicalize `--working-dir`, defaulting to the current directory.
pub fn resolve_working_dir(dir: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let dir = match dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    dir.canonicalize()
        .with_context(|| format!("working directory {} is not accessible", dir.display()))
}

/// Exit code for an error: the workflow's own mapping, else 2.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<WorkflowError>()
        .map(WorkflowError::exit_code)
        .unwrap_or(2)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Logs go to stderr; stdout is reserved for the piped state line.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Plan { request, assistant } => {
            plan_cmd::run_plan(&request.join(" "), &assistant).await
        }
        Commands::Build {
            run_id,
            plan_file,
            assistant,
        } => build_cmd::run_build(run_id.as_deref(), plan_file.as_deref(), &assistant).await,
        Commands::Init { working_dir, force } => init_cmd::run_init(working_dir, force),
        Commands::Status {
            run_id,
            working_dir,
        } => status_cmd::run_status(run_id.as_deref(), working_dir),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn plan_joins_request_words() {
        let cli = Cli::try_parse_from(["agentic", "plan", "fix", "the", "bug", "--model", "small"])
            .unwrap();
        match cli.command {
            Commands::Plan { request, assistant } => {
                assert_eq!(request.join(" "), "fix the bug");
                assert_eq!(assistant.model.to_domain(), ModelTier::Small);
                assert_eq!(assistant.cli.to_domain(), CliKind::Claude);
                assert!(!assistant.no_skip_permissions);
            }
            _ => panic!("expected plan"),
        }
    }

    #[test]
    fn build_accepts_source_flags() {
        let cli = Cli::try_parse_from([
            "agentic",
            "build",
            "--run-id",
            "abcd1234",
            "--cli",
            "gemini",
        ])
        .unwrap();
        match cli.command {
            Commands::Build {
                run_id,
                plan_file,
                assistant,
            } => {
                assert_eq!(run_id.as_deref(), Some("abcd1234"));
                assert!(plan_file.is_none());
                assert_eq!(assistant.cli.to_domain(), CliKind::Gemini);
                assert_eq!(assistant.model.to_domain(), ModelTier::Large);
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn unknown_model_is_rejected() {
        assert!(Cli::try_parse_from(["agentic", "plan", "x", "--model", "huge"]).is_err());
    }

    #[test]
    fn exit_code_follows_workflow_error() {
        let assistant = anyhow::Error::new(WorkflowError::AssistantFailed {
            kind: agentic_core::harness::FailureKind::ProcessFailed,
            message: "boom".into(),
        });
        assert_eq!(exit_code(&assistant), 1);

        let bad_args = anyhow::Error::new(WorkflowError::BadArguments("x".into()))
            .context("while building");
        assert_eq!(exit_code(&bad_args), 2);

        assert_eq!(exit_code(&anyhow::anyhow!("plain")), 2);
    }

    #[test]
    fn working_dir_is_canonicalized() {
        let tmp = tempfile::tempdir().unwrap();
        let resolved = resolve_working_dir(Some(tmp.path().join("."))).unwrap();
        assert_eq!(resolved, tmp.path().canonicalize().unwrap());
        assert!(resolve_working_dir(Some(tmp.path().join("missing"))).is_err());
    }
}
