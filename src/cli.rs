// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! NOTE: this expects `clap` to be built with the `derive` feature, e.g.:
//! `clap = { version = "4.5", features = ["derive"] }` in `Cargo.toml`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `pipedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pipedag",
    version,
    about = "Run a pipeline of file-producing functions over a dependency DAG.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline file (TOML).
    ///
    /// Default: `Pipedag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Pipedag.toml")]
    pub config: String,

    /// Actually execute the pipeline. Without this flag, pipedag validates
    /// the pipeline and prints the execution plan (dry-run).
    #[arg(long)]
    pub run: bool,

    /// Ignore existing outputs and fingerprints; run every function.
    #[arg(long)]
    pub start_from_scratch: bool,

    /// Which backend executes command-line functions.
    #[arg(long, value_enum, value_name = "BACKEND", default_value = "shell")]
    pub job_runner: JobRunnerKind,

    /// Shorthand for `--job-runner lsf`.
    #[arg(long)]
    pub bsub: bool,

    /// Batch queue to submit to (LSF / Grid Engine backends).
    #[arg(long, value_name = "NAME")]
    pub job_queue: Option<String>,

    /// Directory for per-function job logs. Overrides `[pipeline].run_dir`.
    #[arg(long, value_name = "PATH")]
    pub run_dir: Option<PathBuf>,

    /// Directory for scatter shards and fingerprints. Overrides
    /// `[pipeline].temp_dir`.
    #[arg(long, value_name = "PATH")]
    pub temp_dir: Option<PathBuf>,

    /// Recipients for status / failure notifications.
    #[arg(long, value_name = "ADDR")]
    pub status_email_to: Vec<String>,

    /// Sender address for status / failure notifications.
    #[arg(long, value_name = "ADDR")]
    pub status_email_from: Option<String>,

    /// Write the dependency graph (before scatter expansion) as DOT.
    #[arg(long, value_name = "PATH")]
    pub dot: Option<PathBuf>,

    /// Write the dependency graph after scatter expansion as DOT.
    #[arg(long, value_name = "PATH")]
    pub expanded_dot: Option<PathBuf>,

    /// Disable the scatter/gather rewriter.
    #[arg(long)]
    pub no_scatter: bool,

    /// Seconds between status polls of running jobs.
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub poll_interval: u64,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIPEDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// Effective backend, folding the `--bsub` shorthand into `--job-runner`.
    pub fn effective_job_runner(&self) -> JobRunnerKind {
        if self.bsub {
            JobRunnerKind::Lsf
        } else {
            self.job_runner
        }
    }
}

/// Backend selection as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum JobRunnerKind {
    /// Run commands locally via `sh -c`.
    Shell,
    /// Submit to LSF via `bsub` / `bjobs` / `bkill`.
    Lsf,
    /// Submit to Grid Engine via `qsub` / `qstat` / `qdel`.
    Gridengine,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// The filter directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
