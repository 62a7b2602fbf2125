// src/exec/batch.rs

//! Batch scheduler backends: LSF and Grid Engine.
//!
//! Jobs are submitted with the scheduler's CLI (`bsub` / `qsub`), observed
//! with its query tool (`bjobs` / `qstat`), and cancelled with its kill tool
//! (`bkill` / `qdel`). A submitted job registers itself with the shutdown
//! registry so outstanding jobs can be cancelled when the driver dies.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::engine::shutdown::{self, RemoteJob};
use crate::exec::{BoxFuture, JobRunner, RunnerStatus};

/// Which batch scheduler a job was submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchFlavor {
    Lsf,
    GridEngine,
}

impl BatchFlavor {
    pub fn cancel_program(self) -> &'static str {
        match self {
            BatchFlavor::Lsf => "bkill",
            BatchFlavor::GridEngine => "qdel",
        }
    }
}

/// A job running on a remote batch scheduler.
pub struct BatchJobRunner {
    flavor: BatchFlavor,
    name: String,
    cmd: String,
    queue: Option<String>,
    output_file: PathBuf,
    error_file: PathBuf,
    job_id: Option<String>,
    registry_token: Option<u64>,
    status: RunnerStatus,
}

impl BatchJobRunner {
    pub fn new(
        flavor: BatchFlavor,
        name: impl Into<String>,
        cmd: impl Into<String>,
        queue: Option<String>,
        output_file: PathBuf,
        error_file: PathBuf,
    ) -> Self {
        Self {
            flavor,
            name: name.into(),
            cmd: cmd.into(),
            queue,
            output_file,
            error_file,
            job_id: None,
            registry_token: None,
            status: RunnerStatus::Pending,
        }
    }

    async fn submit(&mut self) -> Result<()> {
        let mut command = match self.flavor {
            BatchFlavor::Lsf => {
                let mut c = Command::new("bsub");
                c.arg("-J").arg(&self.name);
                c.arg("-o").arg(&self.output_file);
                c.arg("-e").arg(&self.error_file);
                if let Some(ref queue) = self.queue {
                    c.arg("-q").arg(queue);
                }
                c.arg(&self.cmd);
                c
            }
            BatchFlavor::GridEngine => {
                let mut c = Command::new("qsub");
                c.args(["-terse", "-b", "y"]);
                c.arg("-N").arg(&self.name);
                c.arg("-o").arg(&self.output_file);
                c.arg("-e").arg(&self.error_file);
                if let Some(ref queue) = self.queue {
                    c.arg("-q").arg(queue);
                }
                c.args(["sh", "-c"]).arg(&self.cmd);
                c
            }
        };

        let output = command
            .output()
            .await
            .with_context(|| format!("submitting function '{}' to the batch scheduler", self.name))?;

        if !output.status.success() {
            self.status = RunnerStatus::Failed;
            return Err(anyhow!(
                "batch submission for function '{}' failed: {}",
                self.name,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let job_id = match self.flavor {
            // `Job <1234> is submitted to queue <normal>.`
            BatchFlavor::Lsf => stdout
                .split('<')
                .nth(1)
                .and_then(|rest| rest.split('>').next())
                .map(|id| id.to_string()),
            // `-terse` prints the bare job id.
            BatchFlavor::GridEngine => stdout
                .split_whitespace()
                .next()
                .map(|id| id.to_string()),
        };

        let job_id = job_id.ok_or_else(|| {
            anyhow!(
                "could not parse a job id for function '{}' from: {}",
                self.name,
                stdout.trim()
            )
        })?;

        info!(function = %self.name, job_id = %job_id, "batch job submitted");

        self.registry_token = Some(shutdown::register(RemoteJob {
            flavor: self.flavor,
            job_id: job_id.clone(),
        }));
        self.job_id = Some(job_id);
        self.status = RunnerStatus::Running;
        Ok(())
    }

    async fn poll(&mut self) -> RunnerStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        let Some(job_id) = self.job_id.clone() else {
            return self.status;
        };

        let polled = match self.flavor {
            BatchFlavor::Lsf => poll_lsf(&job_id).await,
            BatchFlavor::GridEngine => poll_grid_engine(&job_id).await,
        };

        match polled {
            Ok(status) => {
                if status.is_terminal() {
                    self.finish(status);
                }
                self.status
            }
            Err(err) => {
                // A transient query failure is not a job failure; keep the
                // last observed status and try again next poll.
                warn!(
                    function = %self.name,
                    job_id = %job_id,
                    error = %err,
                    "batch status query failed"
                );
                self.status
            }
        }
    }

    fn finish(&mut self, status: RunnerStatus) {
        self.status = status;
        if let Some(token) = self.registry_token.take() {
            shutdown::unregister(token);
        }
    }

    async fn cancel(&mut self) {
        let Some(job_id) = self.job_id.clone() else { return };
        if self.status.is_terminal() {
            return;
        }
        info!(function = %self.name, job_id = %job_id, "cancelling batch job");

        let result = Command::new(self.flavor.cancel_program())
            .arg(&job_id)
            .output()
            .await;
        if let Err(err) = result {
            warn!(
                function = %self.name,
                job_id = %job_id,
                error = %err,
                "batch cancel failed"
            );
        }
        self.finish(RunnerStatus::Failed);
    }
}

impl JobRunner for BatchJobRunner {
    fn start(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.submit())
    }

    fn status(&mut self) -> BoxFuture<'_, RunnerStatus> {
        Box::pin(self.poll())
    }

    fn try_stop(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(self.cancel())
    }

    fn remove_temporary_files(&mut self) -> BoxFuture<'_, ()> {
        // Submission happens without wrapper scripts; nothing to clean.
        Box::pin(async {})
    }
}

/// Query LSF for a job's state.
///
/// `bjobs -noheader` prints `JOBID USER STAT ...`; DONE and EXIT are
/// terminal. A job that has aged out of `bjobs` entirely is reported as
/// done — LSF drops finished jobs from the default view.
async fn poll_lsf(job_id: &str) -> Result<RunnerStatus> {
    let output = Command::new("bjobs")
        .arg("-noheader")
        .arg(job_id)
        .output()
        .await
        .context("running bjobs")?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if stdout.trim().is_empty() || stderr.contains("is not found") {
        debug!(job_id = %job_id, "job no longer known to bjobs; treating as done");
        return Ok(RunnerStatus::Done);
    }

    let stat = stdout.split_whitespace().nth(2).unwrap_or("");
    Ok(match stat {
        "DONE" => RunnerStatus::Done,
        "EXIT" => RunnerStatus::Failed,
        _ => RunnerStatus::Running,
    })
}

/// Query Grid Engine for a job's state.
///
/// `qstat` only lists live jobs, so an absent job id means the job has
/// finished. An error state (`Eqw` and friends) is a failure.
async fn poll_grid_engine(job_id: &str) -> Result<RunnerStatus> {
    let output = Command::new("qstat").output().await.context("running qstat")?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    for line in stdout.lines() {
        let mut fields = line.split_whitespace();
        if fields.next() != Some(job_id) {
            continue;
        }
        // job-ID prior name user state ...
        let state = fields.nth(3).unwrap_or("");
        if state.contains('E') {
            return Ok(RunnerStatus::Failed);
        }
        return Ok(RunnerStatus::Running);
    }

    debug!(job_id = %job_id, "job no longer listed by qstat; treating as done");
    Ok(RunnerStatus::Done)
}
