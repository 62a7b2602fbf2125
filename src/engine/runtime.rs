// src/engine/runtime.rs

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::engine::shutdown;
use crate::exec::{new_runner, Backend, ExecSettings, JobRunner, RunnerStatus};
use crate::fingerprint;
use crate::graph::{EdgeId, Graph, Status};
use crate::report::notify::{self, Notifier};

/// Options that influence how the runtime behaves.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Backend that executes command-line functions.
    pub backend: Backend,
    /// Queue for batch submissions; per-function queues win.
    pub job_queue: Option<String>,
    /// Directory holding scatter shards and output fingerprints.
    pub temp_dir: PathBuf,
    /// How long to sleep when jobs are running but nothing new is ready.
    pub poll_interval: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            backend: Backend::Shell,
            job_queue: None,
            temp_dir: PathBuf::from(".pipedag"),
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// What a finished run looked like.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Names of functions that FAILED. Empty means success.
    pub failed: Vec<String>,
}

/// The scheduling loop.
///
/// Single-threaded cooperative: all graph mutation happens here, and the
/// loop blocks only in the polling sleep. Concurrency comes from the
/// backends; a RUNNING edge is a handle whose status may change between
/// polls.
pub struct Runtime {
    graph: Graph,
    options: RuntimeOptions,
    notifier: Notifier,
    shutting_down: Arc<AtomicBool>,
}

impl Runtime {
    pub fn new(graph: Graph, options: RuntimeOptions, notifier: Notifier) -> Self {
        Self {
            graph,
            options,
            notifier,
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Drive the graph to completion.
    ///
    /// The status notification is sent on every exit path: normal
    /// completion, job failures, and uncaught scheduler errors (which are
    /// re-raised after notifying).
    pub async fn run(&mut self) -> Result<RunOutcome> {
        shutdown::install_signal_handler(self.shutting_down.clone());

        let result = self.drive().await;

        match result {
            Ok(outcome) => {
                self.notifier
                    .send("pipedag run status", &notify::status_body(&self.graph));
                Ok(outcome)
            }
            Err(err) => {
                error!(error = %err, "scheduler error");
                self.notifier
                    .send("pipedag run status", &notify::status_body(&self.graph));
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<RunOutcome> {
        let settings = ExecSettings {
            backend: self.options.backend,
            job_queue: self.options.job_queue.clone(),
        };
        let mut running: HashMap<EdgeId, Box<dyn JobRunner>> = HashMap::new();

        loop {
            if self.shutting_down.load(Ordering::SeqCst) {
                warn!("shutdown in progress; no further functions will be started");
                break;
            }

            // Partition running jobs by their polled status.
            let mut exited: Vec<(EdgeId, RunnerStatus)> = Vec::new();
            for (&id, runner) in running.iter_mut() {
                let status = runner.status().await;
                if status.is_terminal() {
                    exited.push((id, status));
                }
            }

            let mut just_failed: Vec<EdgeId> = Vec::new();
            for (id, status) in exited {
                running.remove(&id);
                match status {
                    RunnerStatus::Done => self.complete(id),
                    _ => {
                        self.fail(id);
                        just_failed.push(id);
                    }
                }
            }

            let ready = self.ready_edges();
            if ready.is_empty() && running.is_empty() {
                if !just_failed.is_empty() {
                    self.notify_failures(&just_failed);
                }
                break;
            }

            for &id in &ready {
                self.start_edge(id, &settings, &mut running, &mut just_failed)
                    .await?;
            }

            if !just_failed.is_empty() {
                self.notify_failures(&just_failed);
            }

            if ready.is_empty() && !running.is_empty() {
                debug!(
                    running = running.len(),
                    "nothing new is ready; sleeping until the next poll"
                );
                tokio::time::sleep(self.options.poll_interval).await;
            }
        }

        // A shutdown can leave local jobs in flight; stop them best-effort.
        for (_, mut runner) in running.drain() {
            runner.try_stop().await;
            runner.remove_temporary_files().await;
        }

        let failed: Vec<String> = self
            .graph
            .function_edge_ids()
            .into_iter()
            .filter_map(|id| {
                let fe = self.graph.function_edge(id)?;
                (fe.status == Status::Failed).then(|| fe.function.name().to_string())
            })
            .collect();

        Ok(RunOutcome { failed })
    }

    /// PENDING function edges whose every previous function is DONE, in
    /// `add_order` order.
    fn ready_edges(&self) -> Vec<EdgeId> {
        self.graph
            .function_edge_ids()
            .into_iter()
            .filter(|&id| {
                let Some(fe) = self.graph.function_edge(id) else {
                    return false;
                };
                if fe.status != Status::Pending {
                    return false;
                }
                self.graph.previous_functions(id).iter().all(|&p| {
                    self.graph.function_edge(p).map(|e| e.status) == Some(Status::Done)
                })
            })
            .collect()
    }

    async fn start_edge(
        &mut self,
        id: EdgeId,
        settings: &ExecSettings,
        running: &mut HashMap<EdgeId, Box<dyn JobRunner>>,
        just_failed: &mut Vec<EdgeId>,
    ) -> Result<()> {
        let function = self
            .graph
            .function_edge(id)
            .expect("ready edge is live")
            .function
            .clone();

        info!(function = %function.name(), "starting function");
        self.set_status(id, Status::Running);

        if let Err(err) = function.prepare_directories() {
            error!(
                function = %function.name(),
                error = %err,
                "could not prepare output directories"
            );
            self.fail(id);
            just_failed.push(id);
            return Ok(());
        }

        // An unbuildable runner is a construction bug, not a job failure.
        let mut runner = new_runner(&function, settings)?;

        if let Err(err) = runner.start().await {
            error!(
                function = %function.name(),
                error = %err,
                "function failed to start"
            );
            self.fail(id);
            just_failed.push(id);
            return Ok(());
        }

        match runner.status().await {
            RunnerStatus::Done => self.complete(id),
            RunnerStatus::Failed => {
                self.fail(id);
                just_failed.push(id);
            }
            RunnerStatus::Pending | RunnerStatus::Running => {
                running.insert(id, runner);
            }
        }
        Ok(())
    }

    fn complete(&mut self, id: EdgeId) {
        self.set_status(id, Status::Done);

        let Some(fe) = self.graph.function_edge(id) else { return };
        let function = &fe.function;
        info!(function = %function.name(), "function finished");

        match fingerprint::compute_fingerprint(function.outputs().iter()) {
            Ok(hash) => {
                let store = fingerprint::FingerprintStore::new(&self.options.temp_dir);
                if let Err(err) = store.record(function.name(), &hash) {
                    warn!(
                        function = %function.name(),
                        error = %err,
                        "failed to record output fingerprint"
                    );
                }
            }
            Err(err) => {
                warn!(
                    function = %function.name(),
                    error = %err,
                    "failed to hash outputs"
                );
            }
        }

        // A finished gather no longer needs its shard directory.
        if let Some(dir) = function.cleanup_dir() {
            debug!(function = %function.name(), dir = %dir.display(), "removing shard directory");
            if let Err(err) = fs::remove_dir_all(dir) {
                warn!(
                    function = %function.name(),
                    error = %err,
                    "failed to remove shard directory"
                );
            }
        }
    }

    fn fail(&mut self, id: EdgeId) {
        self.set_status(id, Status::Failed);
        if let Some(fe) = self.graph.function_edge(id) {
            error!(
                function = %fe.function.name(),
                job_output = ?fe.function.job_output_file(),
                job_error = ?fe.function.job_error_file(),
                "function failed"
            );
        }
    }

    fn set_status(&mut self, id: EdgeId, status: Status) {
        if let Some(fe) = self.graph.function_edge_mut(id) {
            fe.status = status;
        }
    }

    fn notify_failures(&self, just_failed: &[EdgeId]) {
        self.notifier.send(
            "pipedag function failures",
            &notify::failure_body(&self.graph, just_failed),
        );
    }
}
