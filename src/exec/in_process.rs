// src/exec/in_process.rs

use std::fs;

use anyhow::Result;
use tracing::{error, info};

use crate::exec::{BoxFuture, JobRunner, RunnerStatus};
use crate::function::PipelineFunction;

/// Runs an in-process function to completion inside `start()`.
///
/// The scheduling loop observes DONE (or FAILED) immediately and never
/// places these in the running set.
pub struct InProcessRunner {
    function: PipelineFunction,
    status: RunnerStatus,
}

impl InProcessRunner {
    pub fn new(function: PipelineFunction) -> Self {
        Self {
            function,
            status: RunnerStatus::Pending,
        }
    }

    fn execute(&mut self) -> Result<()> {
        info!(function = %self.function.name(), "running in-process function");

        match self.function.run_in_process() {
            Ok(()) => {
                self.status = RunnerStatus::Done;
            }
            Err(err) => {
                error!(
                    function = %self.function.name(),
                    error = %err,
                    "in-process function failed"
                );
                // Keep the failure in the job error file for post-mortem,
                // like a process backend would.
                if let Some(path) = self.function.job_error_file() {
                    let _ = fs::write(path, format!("{err:?}\n"));
                }
                self.status = RunnerStatus::Failed;
            }
        }
        Ok(())
    }
}

impl JobRunner for InProcessRunner {
    fn start(&mut self) -> BoxFuture<'_, Result<()>> {
        let result = self.execute();
        Box::pin(async move { result })
    }

    fn status(&mut self) -> BoxFuture<'_, RunnerStatus> {
        let status = self.status;
        Box::pin(async move { status })
    }

    fn try_stop(&mut self) -> BoxFuture<'_, ()> {
        // Already finished by the time anyone could ask.
        Box::pin(async {})
    }

    fn remove_temporary_files(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}
