//! evalgrid - batch evaluation orchestrator
//!
//! Runs an external evaluation harness once per (model, task) pair and
//! aggregates the per-task result files into per-model summary tables.
//!
//! ## Commands
//!
//! - `run`: evaluate the job matrix
//! - `summarize`: rebuild the per-model summary tables
//! - `all`: `run` followed by `summarize`
//! - `plan`: show the job matrix without running anything
//! - `config`: print the effective configuration

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use evalgrid_core::telemetry::{init_tracing, level_for};
use evalgrid_core::{split_list, ConfigOverrides, EvalConfig, JobMatrix};
use evalgrid_runner::{
    write_run_report, EvaluationLoop, Invocation, JobOutcome, ProcessRunner, RunGate, RunReport,
    RUN_REPORT_FILE,
};
use evalgrid_summary::{summarize_results, FileOutcome, ModelSummaryOutcome, SummaryReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "evalgrid")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch evaluation orchestrator for model checkpoints", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long, global = true, env = "EVALGRID_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the harness for every (model, task) pair
    Run {
        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Build one summary table per model from existing result files
    Summarize {
        /// Results root (default: configured results_dir)
        #[arg(long)]
        results_dir: Option<PathBuf>,
    },

    /// Run the matrix, then summarize
    All {
        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Show the job matrix and commands without running anything
    Plan {
        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        overrides: OverrideArgs,
    },
}

/// Values that replace the configured ones for this invocation.
#[derive(Args, Debug, Default)]
struct OverrideArgs {
    /// Models to evaluate (comma-separated)
    #[arg(long)]
    models: Option<String>,

    /// Tasks to evaluate (comma-separated)
    #[arg(long)]
    tasks: Option<String>,

    /// Batch size passed to the harness (e.g. 8, auto)
    #[arg(long)]
    batch_size: Option<String>,

    /// Compute device passed to the harness (e.g. cuda:0)
    #[arg(long)]
    device: Option<String>,

    /// Directory containing one prepared model directory per model
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Results root
    #[arg(long)]
    results_dir: Option<PathBuf>,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(args: OverrideArgs) -> Self {
        ConfigOverrides {
            base_model_dir: args.model_dir,
            results_dir: args.results_dir,
            device: args.device,
            batch_size: args.batch_size,
            models: args.models.as_deref().map(split_list),
            tasks: args.tasks.as_deref().map(split_list),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json, level_for(cli.verbose));

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run { overrides } => {
            let config = load_config(config_path, overrides.into())?;
            cmd_run(config).await.map(|_| ())
        }
        Commands::Summarize { results_dir } => {
            let config = load_unvalidated(config_path, ConfigOverrides {
                results_dir,
                ..Default::default()
            })?;
            cmd_summarize(&config.results_dir)
        }
        Commands::All { overrides } => {
            let config = load_config(config_path, overrides.into())?;
            let results_dir = config.results_dir.clone();
            cmd_run(config).await?;
            println!();
            cmd_summarize(&results_dir)
        }
        Commands::Plan { overrides } => {
            let config = load_config(config_path, overrides.into())?;
            cmd_plan(&config);
            Ok(())
        }
        Commands::Config { overrides } => {
            let config = load_config(config_path, overrides.into())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn load_unvalidated(path: Option<&Path>, overrides: ConfigOverrides) -> Result<EvalConfig> {
    let config = match path {
        Some(path) => EvalConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EvalConfig::default(),
    };
    Ok(config.apply(overrides))
}

/// Defaults, then the config file, then command-line overrides; validated.
fn load_config(path: Option<&Path>, overrides: ConfigOverrides) -> Result<EvalConfig> {
    let config = load_unvalidated(path, overrides)?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Run the matrix and print the report. Job failures are not errors.
async fn cmd_run(config: EvalConfig) -> Result<RunReport> {
    println!("Evaluating {} models x {} tasks", config.models.len(), config.tasks.len());
    println!("Model directory: {}", config.base_model_dir.display());
    println!("Results directory: {}", config.results_dir.display());
    println!();

    let runner = ProcessRunner::stdout().with_timeout_secs(config.timeout_secs);
    let results_dir = config.results_dir.clone();
    let report = EvaluationLoop::new(config, Arc::new(runner))
        .run()
        .await
        .context("evaluation run could not start")?;

    let report_path = results_dir.join(RUN_REPORT_FILE);
    match write_run_report(&report_path, &report) {
        Ok(()) => info!(path = %report_path.display(), "Run report written"),
        Err(e) => warn!(path = %report_path.display(), error = %e, "Failed to write run report"),
    }

    print_run_report(&report);
    Ok(report)
}

fn print_run_report(report: &RunReport) {
    println!();
    println!("Run ID: {}", report.run_id);
    println!("Matrix: {}", &report.matrix_digest[..12.min(report.matrix_digest.len())]);
    println!("Duration: {}ms", report.duration_ms);
    if report.preflight_failures > 0 {
        println!("Preflight failures: {}", report.preflight_failures);
    }
    println!();

    for job in &report.jobs {
        let (status, detail) = match job.outcome {
            JobOutcome::Succeeded => ("✓", format!("{}ms", job.duration_ms)),
            JobOutcome::Failed { exit_code } => {
                ("✗", format!("{}ms, exit code: {}", job.duration_ms, exit_code))
            }
            JobOutcome::Skipped => ("-", "skipped, model not found".to_string()),
        };
        println!("  {} {} / {} ({})", status, job.model, job.task, detail);
    }

    println!();
    let status = if report.all_succeeded() { "✓" } else { "✗" };
    println!(
        "{} Summary: {} succeeded, {} failed, {} skipped",
        status,
        report.succeeded_count(),
        report.failed_count(),
        report.skipped_count()
    );
    for job in report.failures() {
        println!("  rerun: evalgrid run --models {} --tasks {}", job.model, job.task);
    }
    println!("Results are saved in: {}", report.results_dir.display());
}

fn cmd_summarize(results_dir: &Path) -> Result<()> {
    let report = summarize_results(results_dir)
        .with_context(|| format!("failed to summarize {}", results_dir.display()))?;
    print_summary_report(&report);
    Ok(())
}

fn print_summary_report(report: &SummaryReport) {
    if report.models.is_empty() {
        println!("No model directories found");
        return;
    }

    for model in &report.models {
        match &model.outcome {
            ModelSummaryOutcome::Written { path, records } => {
                println!("✓ {} ({} rows) -> {}", model.model, records, path.display())
            }
            ModelSummaryOutcome::Empty => println!("- {} (no usable results)", model.model),
            ModelSummaryOutcome::Failed { error } => println!("✗ {} ({})", model.model, error),
        }
        for file in &model.files {
            match &file.outcome {
                FileOutcome::Parsed { records } => {
                    println!("    {}: {} metrics", file.task, records)
                }
                FileOutcome::NoResults => println!("    {}: no results", file.task),
                FileOutcome::Malformed { error } => {
                    println!("    {}: skipped ({})", file.task, error)
                }
            }
        }
    }

    println!();
    println!(
        "Summary: {}/{} models summarized",
        report.written_count(),
        report.models.len()
    );
}

fn cmd_plan(config: &EvalConfig) {
    let matrix = JobMatrix::from_config(config);
    println!(
        "Jobs: {} models x {} tasks = {} ({})",
        matrix.models().len(),
        matrix.tasks().len(),
        matrix.len(),
        &matrix.digest()[..12]
    );

    for command in &config.preflight {
        if let Ok(invocation) = Invocation::from_command(command) {
            println!("preflight: {}", invocation);
        }
    }

    for model in matrix.models() {
        let model_dir = matrix.model_dir(model);
        if RunGate::is_runnable(&model_dir) {
            println!("\n{} ({})", model, model_dir.display());
        } else {
            println!("\n{} (missing: {}, will be skipped)", model, model_dir.display());
        }
    }

    println!();
    for job in matrix.jobs() {
        println!("{}", Invocation::for_job(&job, config));
    }
}
