//! Autoedit CLI - run one auto-editor job from the command line
//! Composition root: wires config, logging and the tokio launcher into the core runner

mod logging;

use anyhow::{Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};
use tracing::info;

use autoedit_core::application::runner::constants::{DEFAULT_MAX_CAPTURED_BYTES, DEFAULT_TIMEOUT};
use autoedit_core::application::template::DEFAULT_TRUSTED_COMMAND;
use autoedit_core::application::{
    tokenize, validate_command_template, CommandTemplate, JobRunner, RunnerConfig,
};
use autoedit_core::domain::{JobRecord, JobStatus};
use autoedit_core::port::id_provider::UuidProvider;
use autoedit_core::port::time_provider::SystemTimeProvider;
use autoedit_core::port::IdProvider;
use autoedit_core::AppError;
use autoedit_infra_system::TokioProcessLauncher;
use serde_json::Value;

const DEFAULT_OUTPUT_EXT: &str = "mp4";
const DEFAULT_KILL_GRACE_MS: u64 = 5000;

#[derive(Parser)]
#[command(name = "autoedit")]
#[command(about = "Run auto-editor jobs with validation, timeout and status tracking", long_about = None)]
#[command(version = autoedit_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Command name every template must start with
    #[arg(
        long,
        global = true,
        env = "AUTOEDIT_TRUSTED_COMMAND",
        default_value = DEFAULT_TRUSTED_COMMAND,
        value_parser = NonEmptyStringValueParser::new()
    )]
    trusted_command: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a template, run it and print the final job record
    Run(RunArgs),

    /// Validate a template without running it
    Validate {
        /// Command template, e.g. "auto-editor {input} -o {output}"
        template: String,

        /// Treat the argument as a JSON value (as received in a request
        /// payload) and print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the argument vector a command string tokenizes to
    Tokenize {
        /// Fully substituted command string
        command: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Command template, e.g. "auto-editor {input} -o {output}"
    template: String,

    /// Input media file
    input: PathBuf,

    /// Output file extension
    #[arg(short, long, default_value = DEFAULT_OUTPUT_EXT)]
    ext: String,

    /// Job ID (default: random UUID)
    #[arg(long)]
    job_id: Option<String>,

    /// Parent directory of job workspaces (default: system temp dir)
    #[arg(long, env = "AUTOEDIT_WORKSPACE_ROOT")]
    workspace_root: Option<String>,

    /// Hard timeout for one run, in seconds
    #[arg(long, env = "AUTOEDIT_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Retained bytes per captured output stream
    #[arg(long, env = "AUTOEDIT_MAX_CAPTURE_BYTES", default_value_t = DEFAULT_MAX_CAPTURED_BYTES)]
    max_capture_bytes: usize,

    /// Executable to run for the trusted command (default: resolved via PATH)
    #[arg(long, env = "AUTOEDIT_BIN")]
    bin: Option<PathBuf>,

    /// Grace period between SIGTERM and SIGKILL on timeout, in milliseconds
    #[arg(long, env = "AUTOEDIT_KILL_GRACE_MS", default_value_t = DEFAULT_KILL_GRACE_MS)]
    kill_grace_ms: u64,

    /// Print the job record as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Tabled)]
struct ArgRow {
    index: usize,
    arg: String,
}

#[derive(Tabled)]
struct JobRow {
    field: &'static str,
    value: String,
}

fn runner_config(args: &RunArgs, trusted_command: &str) -> Result<RunnerConfig> {
    if args.timeout_secs == 0 {
        anyhow::bail!("timeout must be at least one second");
    }

    let workspace_root = match &args.workspace_root {
        Some(root) => PathBuf::from(
            shellexpand::full(root)
                .context("Invalid workspace root")?
                .into_owned(),
        ),
        None => std::env::temp_dir(),
    };

    Ok(RunnerConfig {
        trusted_command: trusted_command.to_string(),
        workspace_root,
        timeout: Duration::from_secs(args.timeout_secs),
        max_captured_bytes: args.max_capture_bytes,
    })
}

async fn run_job(args: RunArgs, trusted_command: &str) -> Result<JobStatus> {
    let template = CommandTemplate::parse(&args.template, trusted_command)
        .map_err(AppError::from)
        .context("Template rejected")?;
    let config = runner_config(&args, trusted_command)?;

    let mut launcher = TokioProcessLauncher::new()
        .with_kill_grace(Duration::from_millis(args.kill_grace_ms));
    if let Some(bin) = &args.bin {
        launcher = launcher.with_executable(trusted_command, bin);
    }

    let job_id = args
        .job_id
        .clone()
        .unwrap_or_else(|| UuidProvider.generate_id());

    info!(
        job_id = %job_id,
        workspace_root = %config.workspace_root.display(),
        timeout_secs = config.timeout.as_secs(),
        "Starting job"
    );

    let runner = Arc::new(JobRunner::new(
        config,
        Arc::new(launcher),
        Arc::new(SystemTimeProvider),
    ));
    let job = runner
        .spawn(template, args.input, args.ext, JobRecord::new(job_id))
        .await
        .context("Runner task failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else {
        print_job(&job);
    }

    Ok(job.status)
}

fn print_job(job: &JobRecord) {
    match job.status {
        JobStatus::Finished => println!("{}", "✓ Job finished".green().bold()),
        _ => println!("{}", "✗ Job failed".red().bold()),
    }
    println!();

    let rows = vec![
        JobRow {
            field: "id",
            value: job.id.clone(),
        },
        JobRow {
            field: "status",
            value: job.status.to_string(),
        },
        JobRow {
            field: "started_at",
            value: job.started_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        },
        JobRow {
            field: "finished_at",
            value: job.finished_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        },
        JobRow {
            field: "output_path",
            value: job
                .output_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        },
        JobRow {
            field: "error",
            value: job.error.clone().unwrap_or_default(),
        },
    ];
    println!("{}", Table::new(rows));
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let status = run_job(args, &cli.trusted_command).await?;
            if status != JobStatus::Finished {
                std::process::exit(1);
            }
        }

        Commands::Validate { template, json } => {
            if json {
                let value: Value = serde_json::from_str(&template)
                    .map_err(AppError::from)
                    .context("Template payload is not JSON")?;
                let verdict = validate_command_template(&value, &cli.trusted_command);
                println!("{}", serde_json::to_string(&verdict)?);
                if !verdict.ok {
                    std::process::exit(2);
                }
                return Ok(());
            }

            match CommandTemplate::parse(&template, &cli.trusted_command) {
                Ok(_) => println!("{}", "✓ Template is valid".green().bold()),
                Err(e) => {
                    println!("{} {}", "✗".red(), e);
                    std::process::exit(2);
                }
            }
        }

        Commands::Tokenize { command } => {
            let rows: Vec<ArgRow> = tokenize(&command)
                .into_iter()
                .enumerate()
                .map(|(index, arg)| ArgRow { index, arg })
                .collect();

            if rows.is_empty() {
                println!("{}", "(empty command)".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }
    }

    Ok(())
}
