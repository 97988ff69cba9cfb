mod api;
mod config;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::warn;

use forgeloop_core::{
    Controller, TaskContext, TaskOutcome, DEFAULT_MAX_ROUNDS, DEFAULT_STEP_TIMEOUT,
};
use forgeloop_logging::{init_tracing, LogFormat, Logger, TaskLogLine, TaskLogWriter};
use forgeloop_oracle::{create_model, ModelInvocation, ModelKind, PromptTemplates, Proposer, ReviewJudge};
use forgeloop_sandbox::{materialize_bundle, DockerBackend};

use crate::api::ServeOptions;
use crate::config::ProjectConfig;

#[derive(Parser, Debug)]
#[command(
    name = "forgeloop",
    about = "Bounded generate-execute-judge loop for runnable artifact bundles",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API for submitting tasks and editing prompts
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Task description (or reads from task.md if not provided)
    #[arg(short, long)]
    task: Option<String>,

    /// Path to task file (default: ./task.md)
    #[arg(long, default_value = "task.md")]
    task_file: PathBuf,

    /// Acceptance criteria (or reads from criteria.md if not provided)
    #[arg(short, long)]
    criteria: Option<String>,

    /// Path to criteria file (default: ./criteria.md)
    #[arg(long, default_value = "criteria.md")]
    criteria_file: PathBuf,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long)]
    working_dir: Option<PathBuf>,

    /// Model CLI to use for both oracles
    #[arg(long, value_enum)]
    cli: Option<CliChoice>,

    /// Model CLI to use specifically for the propose oracle
    #[arg(long, value_enum)]
    propose_cli: Option<CliChoice>,

    /// Model CLI to use specifically for the judge oracle
    #[arg(long, value_enum)]
    judge_cli: Option<CliChoice>,

    /// Model to use (if the CLI supports it)
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum rounds (default: 20)
    #[arg(short = 'n', long)]
    max_rounds: Option<usize>,

    /// Per-step deadline in seconds for propose, execute and judge calls
    #[arg(long)]
    step_timeout: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Output final result as JSON on stdout
    #[arg(long)]
    json_output: bool,

    /// Write the final bundle into this directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Dry run: show what would happen without executing
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliChoice {
    Claude,
    Opencode,
}

impl From<CliChoice> for ModelKind {
    fn from(choice: CliChoice) -> Self {
        match choice {
            CliChoice::Claude => ModelKind::ClaudeCode,
            CliChoice::Opencode => ModelKind::OpenCode,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Serve { bind }) => serve(&bind).await,
        None => run_task(cli.run).await,
    }
}

async fn run_task(args: RunArgs) -> Result<()> {
    let working_dir = args
        .working_dir
        .clone()
        .map(Ok)
        .unwrap_or_else(std::env::current_dir)
        .context("Failed to determine working directory")?;

    let log_format: LogFormat = args.log_format.into();
    init_tracing("info", log_format);

    let config = ProjectConfig::load(&working_dir)?;
    let config = config.unwrap_or_default();

    let task = read_input(&args.task, &args.task_file, &working_dir, "task")?;
    let criteria = read_input(&args.criteria, &args.criteria_file, &working_dir, "criteria")?;

    let propose_kind = resolve_kind(args.propose_cli.or(args.cli), config.propose_cli())?;
    let judge_kind = resolve_kind(args.judge_cli.or(args.cli), config.judge_cli())?;
    let propose_model = args
        .model
        .clone()
        .or_else(|| config.propose_model().map(String::from));
    let judge_model = args
        .model
        .clone()
        .or_else(|| config.judge_model().map(String::from));

    let max_rounds = args
        .max_rounds
        .or(config.max_rounds)
        .unwrap_or(DEFAULT_MAX_ROUNDS);
    let step_timeout = args
        .step_timeout
        .map(Duration::from_secs)
        .or(config.step_timeout)
        .unwrap_or(DEFAULT_STEP_TIMEOUT);

    let sandbox_env = resolve_sandbox_env(&config.sandbox.env);

    if args.dry_run {
        println!("=== Dry Run ===");
        println!("Task: {}", preview(&task));
        println!("Criteria: {}", preview(&criteria));
        println!("Propose CLI: {}", propose_kind);
        println!("Judge CLI: {}", judge_kind);
        println!("Max rounds: {}", max_rounds);
        println!("Step timeout: {}s", step_timeout.as_secs());
        println!(
            "Sandbox env: {}",
            sandbox_env
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        return Ok(());
    }

    let env_names: Vec<String> = sandbox_env.iter().map(|(name, _)| name.clone()).collect();
    let templates = PromptTemplates::default();

    let proposer = Proposer::new(create_model(propose_kind), templates.clone())
        .with_invocation(ModelInvocation {
            model: propose_model.clone(),
        })
        .with_env_names(env_names);
    let judge = ReviewJudge::new(create_model(judge_kind), templates).with_invocation(
        ModelInvocation {
            model: judge_model.clone(),
        },
    );

    if !proposer.model().is_available().await {
        anyhow::bail!(
            "Propose CLI '{}' is not available. Make sure it's installed and in PATH.",
            proposer.model().name()
        );
    }
    if !judge.model().is_available().await {
        anyhow::bail!(
            "Judge CLI '{}' is not available. Make sure it's installed and in PATH.",
            judge.model().name()
        );
    }

    let mut backend = DockerBackend::new().with_env_vars(sandbox_env);
    if let Some(ref binary) = config.sandbox.docker_binary {
        backend = backend.with_binary_path(binary.clone());
    }
    if !backend.is_available().await {
        anyhow::bail!(
            "Docker is not available at '{}'. The sandbox needs it to build and run bundles.",
            backend.binary_path().display()
        );
    }

    // Task history file; the run proceeds without one if it cannot be opened
    let task_log = match TaskLogWriter::new(&task) {
        Ok(writer) => Some(writer),
        Err(e) => {
            warn!(error = %e, "Task history disabled");
            None
        }
    };
    if let Some(ref writer) = task_log {
        let _ = writer.write(&TaskLogLine::TaskStart {
            timestamp: Utc::now(),
            task: task.clone(),
            criteria: criteria.clone(),
            propose_model: propose_kind.to_string(),
            judge_model: judge_kind.to_string(),
            max_rounds,
        });
    }

    let logger = Arc::new(Logger::new(log_format));
    let controller = Controller::new(&proposer, &judge, &backend, logger);

    // Handle Ctrl+C gracefully
    let interrupt_handle = controller.interrupt_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Finishing current round...");
        interrupt_handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let ctx = TaskContext::new(task, criteria)
        .with_max_rounds(max_rounds)
        .with_step_timeout(step_timeout);

    let outcome = controller.run(ctx).await;

    if let Some(ref writer) = task_log {
        for record in outcome.history() {
            let _ = writer.write(&TaskLogLine::Round {
                round: record.round,
                verdict: record.verdict.clone(),
                descriptor_replaced: record.descriptor_replaced,
                files_replaced: record.files_replaced,
                execution_secs: record.execution_secs,
                failure: record.failure.clone(),
                timestamp: record.timestamp,
            });
        }
        let _ = writer.write(&TaskLogLine::TaskEnd {
            outcome: outcome_label(&outcome).to_string(),
            rounds: outcome.rounds(),
            duration_secs: total_duration_secs(&outcome),
            timestamp: Utc::now(),
        });
    }

    if let Some(ref dir) = args.output_dir {
        if let Some(bundle) = outcome.final_bundle() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            materialize_bundle(dir, bundle)
                .map_err(|e| anyhow::anyhow!("Failed to write bundle: {}", e))?;
            eprintln!("Wrote final bundle to {}", dir.display());
        }
    }

    if args.json_output {
        let json = serde_json::to_string_pretty(&outcome)?;
        println!("{}", json);
    } else {
        print_outcome(&outcome);
    }

    std::process::exit(outcome.exit_code());
}

async fn serve(bind: &str) -> Result<()> {
    init_tracing("info", LogFormat::Compact);

    let working_dir = std::env::current_dir().context("Failed to determine working directory")?;
    let config = ProjectConfig::load(&working_dir)?.unwrap_or_default();

    let options = ServeOptions {
        propose_kind: resolve_kind(None, config.propose_cli())?,
        judge_kind: resolve_kind(None, config.judge_cli())?,
        propose_model: config.propose_model().map(String::from),
        judge_model: config.judge_model().map(String::from),
        max_rounds: config.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS),
        step_timeout: config.step_timeout.unwrap_or(DEFAULT_STEP_TIMEOUT),
        sandbox_env: resolve_sandbox_env(&config.sandbox.env),
        docker_binary: config.sandbox.docker_binary.clone(),
    };

    let router = api::create_router(options);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    eprintln!("forgeloop API listening on {}", bind);
    axum::serve(listener, router)
        .await
        .context("API server failed")?;
    Ok(())
}

fn resolve_kind(flag: Option<CliChoice>, configured: Option<&str>) -> Result<ModelKind> {
    if let Some(choice) = flag {
        return Ok(choice.into());
    }
    match configured {
        Some(name) => name
            .parse::<ModelKind>()
            .map_err(|e| anyhow::anyhow!("{} (in {})", e, config::CONFIG_FILE_NAME)),
        None => Ok(ModelKind::ClaudeCode),
    }
}

/// Read configured environment variable values from the process environment;
/// unset and empty variables are dropped
fn resolve_sandbox_env(names: &[String]) -> Vec<(String, String)> {
    names
        .iter()
        .filter_map(|name| {
            let value = std::env::var(name).unwrap_or_default();
            if value.is_empty() {
                None
            } else {
                Some((name.clone(), value))
            }
        })
        .collect()
}

fn read_input(
    explicit: &Option<String>,
    file: &Path,
    working_dir: &Path,
    what: &str,
) -> Result<String> {
    if let Some(text) = explicit {
        return Ok(text.clone());
    }

    let path = if file.is_absolute() {
        file.to_path_buf()
    } else {
        working_dir.join(file)
    };

    if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {} file", what))?;
        Ok(content.trim().to_string())
    } else {
        anyhow::bail!(
            "No {} provided. Use --{} or create a {} file",
            what,
            what,
            file.display()
        )
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > 100 {
        let head: String = text.chars().take(100).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn outcome_label(outcome: &TaskOutcome) -> &'static str {
    match outcome {
        TaskOutcome::Success { .. } => "success",
        TaskOutcome::Exhausted { .. } => "exhausted",
        TaskOutcome::ProposalFailed { .. } => "proposal_failed",
        TaskOutcome::Interrupted { .. } => "interrupted",
    }
}

fn total_duration_secs(outcome: &TaskOutcome) -> f64 {
    match outcome {
        TaskOutcome::Success {
            total_duration_secs,
            ..
        }
        | TaskOutcome::Exhausted {
            total_duration_secs,
            ..
        }
        | TaskOutcome::ProposalFailed {
            total_duration_secs,
            ..
        }
        | TaskOutcome::Interrupted {
            total_duration_secs,
            ..
        } => *total_duration_secs,
    }
}

fn print_outcome(outcome: &TaskOutcome) {
    match outcome {
        TaskOutcome::Success {
            bundle,
            rounds,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== SUCCESS ===");
            eprintln!("Rounds: {}", rounds);
            eprintln!("Files: {}", bundle.files.len());
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
        TaskOutcome::Exhausted {
            rounds,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== EXHAUSTED ===");
            eprintln!("Round budget spent ({})", rounds);
            eprintln!("Duration: {:.1}s", total_duration_secs);
            eprintln!("The last bundle did not satisfy the acceptance criteria.");
        }
        TaskOutcome::ProposalFailed {
            error,
            total_duration_secs,
        } => {
            eprintln!();
            eprintln!("=== PROPOSAL FAILED ===");
            eprintln!("Error: {}", error);
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
        TaskOutcome::Interrupted {
            rounds,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== INTERRUPTED ===");
            eprintln!("Stopped after {} round(s)", rounds);
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
    }
}
