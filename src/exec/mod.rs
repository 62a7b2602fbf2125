// src/exec/mod.rs

//! Job execution layer.
//!
//! The scheduling loop talks to a [`JobRunner`] instead of a concrete
//! backend. This keeps the loop testable and makes the backends swappable:
//!
//! - [`shell`] runs commands locally via `sh -c`.
//! - [`batch`] submits to LSF (`bsub`) or Grid Engine (`qsub`).
//! - [`in_process`] runs a closure inside the driver.
//!
//! Runners report status by polling; implementations must keep the status
//! monotone and report FAILED for any nonzero exit or backend-reported
//! error.

pub mod batch;
pub mod in_process;
pub mod shell;

use std::future::Future;
use std::pin::Pin;

use anyhow::anyhow;

use crate::function::{FunctionKind, PipelineFunction};
use crate::Result;

pub use batch::{BatchFlavor, BatchJobRunner};
pub use in_process::InProcessRunner;
pub use shell::ShellJobRunner;

/// Boxed future used by the dyn-compatible [`JobRunner`] trait.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Observed state of a job, updated by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl RunnerStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunnerStatus::Done | RunnerStatus::Failed)
    }
}

/// Contract every backend must satisfy.
pub trait JobRunner: Send {
    /// Asynchronously begin execution. In-process functions run to
    /// completion inside this call.
    fn start(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Poll the current status. May issue backend queries (`bjobs`,
    /// `qstat`); must be cheap for local runners.
    fn status(&mut self) -> BoxFuture<'_, RunnerStatus>;

    /// Best-effort cancel; used on shutdown. Idempotent.
    fn try_stop(&mut self) -> BoxFuture<'_, ()>;

    /// Clean up idempotent side effects left behind by this job.
    fn remove_temporary_files(&mut self) -> BoxFuture<'_, ()>;
}

/// Which backend executes command-line functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Shell,
    Lsf,
    GridEngine,
}

/// Backend-wide settings handed to the runner factory.
#[derive(Debug, Clone)]
pub struct ExecSettings {
    pub backend: Backend,
    /// Queue for batch submissions; a function's own queue wins.
    pub job_queue: Option<String>,
}

/// Construct the appropriate runner for a function.
///
/// In-process functions always run in the driver; command-line functions go
/// to the configured backend. The function must be frozen (log-file paths
/// resolved) before a runner can be built.
pub fn new_runner(
    function: &PipelineFunction,
    settings: &ExecSettings,
) -> Result<Box<dyn JobRunner>> {
    match function.kind() {
        FunctionKind::InProcess(_) => Ok(Box::new(InProcessRunner::new(function.clone()))),
        FunctionKind::CommandLine(spec) => {
            let cmd = function
                .rendered_command()
                .expect("command-line function renders a command");
            let output_file = function
                .job_output_file()
                .ok_or_else(|| not_frozen(function))?
                .to_path_buf();
            let error_file = function
                .job_error_file()
                .ok_or_else(|| not_frozen(function))?
                .to_path_buf();
            let queue = spec.queue.clone().or_else(|| settings.job_queue.clone());

            let runner: Box<dyn JobRunner> = match settings.backend {
                Backend::Shell => Box::new(ShellJobRunner::new(
                    function.name(),
                    cmd,
                    output_file,
                    error_file,
                )),
                Backend::Lsf => Box::new(BatchJobRunner::new(
                    BatchFlavor::Lsf,
                    function.name(),
                    cmd,
                    queue,
                    output_file,
                    error_file,
                )),
                Backend::GridEngine => Box::new(BatchJobRunner::new(
                    BatchFlavor::GridEngine,
                    function.name(),
                    cmd,
                    queue,
                    output_file,
                    error_file,
                )),
            };
            Ok(runner)
        }
    }
}

fn not_frozen(function: &PipelineFunction) -> anyhow::Error {
    anyhow!(
        "function '{}' has no resolved log files; was it added to a graph?",
        function.name()
    )
}
