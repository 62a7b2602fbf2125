// src/exec/shell.rs

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::process::Command;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::exec::{BoxFuture, JobRunner, RunnerStatus};

/// Runs a command locally via `sh -c`, with stdout/stderr redirected to the
/// function's job log files.
///
/// The spawned child is owned by a background wait task; the runner observes
/// it through a watch channel. Dropping the runner (or calling `try_stop`)
/// signals the wait task to kill the child.
pub struct ShellJobRunner {
    name: String,
    cmd: String,
    output_file: PathBuf,
    error_file: PathBuf,
    status_rx: Option<watch::Receiver<RunnerStatus>>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl ShellJobRunner {
    pub fn new(
        name: impl Into<String>,
        cmd: impl Into<String>,
        output_file: PathBuf,
        error_file: PathBuf,
    ) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            output_file,
            error_file,
            status_rx: None,
            cancel_tx: None,
        }
    }

    async fn spawn(&mut self) -> Result<()> {
        info!(function = %self.name, cmd = %self.cmd, "starting shell process");

        let stdout = File::create(&self.output_file)
            .with_context(|| format!("creating job output file {:?}", self.output_file))?;
        let stderr = File::create(&self.error_file)
            .with_context(|| format!("creating job error file {:?}", self.error_file))?;

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.cmd)
            .stdout(std::process::Stdio::from(stdout))
            .stderr(std::process::Stdio::from(stderr))
            .kill_on_drop(true);

        let child = command
            .spawn()
            .with_context(|| format!("spawning process for function '{}'", self.name))?;

        let (status_tx, status_rx) = watch::channel(RunnerStatus::Running);
        let (cancel_tx, cancel_rx) = oneshot::channel();

        tokio::spawn(wait_for_exit(self.name.clone(), child, status_tx, cancel_rx));

        self.status_rx = Some(status_rx);
        self.cancel_tx = Some(cancel_tx);
        Ok(())
    }

    fn current_status(&self) -> RunnerStatus {
        self.status_rx
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(RunnerStatus::Pending)
    }
}

impl JobRunner for ShellJobRunner {
    fn start(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.spawn())
    }

    fn status(&mut self) -> BoxFuture<'_, RunnerStatus> {
        let status = self.current_status();
        Box::pin(async move { status })
    }

    fn try_stop(&mut self) -> BoxFuture<'_, ()> {
        if let Some(cancel) = self.cancel_tx.take() {
            debug!(function = %self.name, "requesting shell process cancellation");
            let _ = cancel.send(());
        }
        Box::pin(async {})
    }

    fn remove_temporary_files(&mut self) -> BoxFuture<'_, ()> {
        // Shell jobs write only their declared outputs and log files.
        Box::pin(async {})
    }
}

/// Wait for the child to exit, or kill it when cancellation is requested.
///
/// A closed cancel channel means the runner was discarded while the process
/// was still running; treat that as cancellation too.
async fn wait_for_exit(
    name: String,
    mut child: tokio::process::Child,
    status_tx: watch::Sender<RunnerStatus>,
    cancel_rx: oneshot::Receiver<()>,
) {
    tokio::select! {
        status_res = child.wait() => {
            let status = match status_res {
                Ok(status) => status,
                Err(err) => {
                    warn!(function = %name, error = %err, "failed waiting for shell process");
                    let _ = status_tx.send(RunnerStatus::Failed);
                    return;
                }
            };

            let code = status.code().unwrap_or(-1);
            info!(
                function = %name,
                exit_code = code,
                success = status.success(),
                "shell process exited"
            );

            let outcome = if status.success() {
                RunnerStatus::Done
            } else {
                RunnerStatus::Failed
            };
            let _ = status_tx.send(outcome);
        }

        _ = cancel_rx => {
            info!(function = %name, "killing shell process on cancellation");
            if let Err(err) = child.kill().await {
                warn!(function = %name, error = %err, "failed to kill shell process");
            }
            let _ = status_tx.send(RunnerStatus::Failed);
        }
    }
}
