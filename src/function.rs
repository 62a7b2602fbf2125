// src/function.rs

//! The unit of work in a pipeline.
//!
//! A [`PipelineFunction`] declares the files it reads and writes plus a
//! command (an external process or an in-process closure). The graph is
//! derived entirely from these declarations, so correctness of a pipeline
//! rests on functions declaring every file dependency.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use crate::fingerprint;

/// How a function is executed.
#[derive(Clone)]
pub enum FunctionKind {
    /// Executed via a backend (`sh -c`, `bsub`, `qsub`).
    CommandLine(CommandSpec),
    /// A closure run to completion inside the driver process.
    InProcess(InProcessFn),
}

impl fmt::Debug for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionKind::CommandLine(spec) => {
                f.debug_struct("CommandLine").field("cmd", &spec.cmd).finish()
            }
            FunctionKind::InProcess(_) => f.write_str("InProcess"),
        }
    }
}

/// Command template and batch settings for a command-line function.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Command template; `{inputs}` / `{outputs}` expand to the function's
    /// space-joined sorted file lists at execution time.
    pub cmd: String,
    /// Batch queue override.
    pub queue: Option<String>,
    /// Present (with `count > 1`) when the function is scatter-gatherable.
    pub scatter: Option<ScatterSpec>,
}

/// Shard settings for a scatter-gatherable function.
#[derive(Debug, Clone)]
pub struct ScatterSpec {
    pub count: usize,
    /// Gather command template; defaults to concatenating shard outputs.
    pub gather_cmd: Option<String>,
}

/// A boxed in-process computation.
#[derive(Clone)]
pub struct InProcessFn(pub(crate) Arc<dyn Fn() -> Result<()> + Send + Sync>);

/// Tag the scatter/gather rewriter stamps on generated functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScatterTag {
    None,
    Clone,
    Gather,
}

/// A frozen-able description of a unit of work.
///
/// Constructed through [`PipelineFunction::command_line`] or
/// [`PipelineFunction::in_process`] and the chainable setters, then frozen by
/// the graph on insertion.
#[derive(Debug, Clone)]
pub struct PipelineFunction {
    name: String,
    description: Option<String>,
    analysis_name: String,
    add_order: Vec<u32>,
    inputs: BTreeSet<PathBuf>,
    outputs: BTreeSet<PathBuf>,
    is_intermediate: bool,
    kind: FunctionKind,
    scatter_tag: ScatterTag,
    job_output_file: Option<PathBuf>,
    job_error_file: Option<PathBuf>,
    /// Directory removed once this function (a gather) completes.
    cleanup_dir: Option<PathBuf>,
    frozen: bool,
}

impl PipelineFunction {
    /// A function executed via a backend.
    pub fn command_line(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self::new(
            name,
            FunctionKind::CommandLine(CommandSpec {
                cmd: cmd.into(),
                queue: None,
                scatter: None,
            }),
        )
    }

    /// A function run in the driver process.
    pub fn in_process<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        Self::new(name, FunctionKind::InProcess(InProcessFn(Arc::new(f))))
    }

    fn new(name: impl Into<String>, kind: FunctionKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            analysis_name: String::new(),
            add_order: Vec::new(),
            inputs: BTreeSet::new(),
            outputs: BTreeSet::new(),
            is_intermediate: false,
            kind,
            scatter_tag: ScatterTag::None,
            job_output_file: None,
            job_error_file: None,
            cleanup_dir: None,
            frozen: false,
        }
    }

    /// Declare the files this function reads.
    pub fn reads<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.inputs.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Declare the files this function produces.
    pub fn writes<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.outputs.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Mark the outputs as disposable intermediates.
    pub fn intermediate(mut self, yes: bool) -> Self {
        self.is_intermediate = yes;
        self
    }

    /// Override the analysis label (defaults to the function name).
    pub fn analysis(mut self, label: impl Into<String>) -> Self {
        self.analysis_name = label.into();
        self
    }

    /// Attach a free-form description (used in logs and DOT labels).
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Batch queue override (command-line functions only; ignored otherwise).
    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        if let FunctionKind::CommandLine(ref mut spec) = self.kind {
            spec.queue = Some(queue.into());
        }
        self
    }

    /// Make this function scatter-gatherable into `count` shards.
    pub fn scatter(mut self, count: usize) -> Self {
        if let FunctionKind::CommandLine(ref mut spec) = self.kind {
            spec.scatter = Some(ScatterSpec {
                count,
                gather_cmd: spec.scatter.take().and_then(|s| s.gather_cmd),
            });
        }
        self
    }

    /// Set the command used to combine shard outputs.
    pub fn gather_cmd(mut self, cmd: impl Into<String>) -> Self {
        if let FunctionKind::CommandLine(ref mut spec) = self.kind {
            match spec.scatter {
                Some(ref mut s) => s.gather_cmd = Some(cmd.into()),
                None => {
                    spec.scatter = Some(ScatterSpec {
                        count: 1,
                        gather_cmd: Some(cmd.into()),
                    })
                }
            }
        }
        self
    }

    pub(crate) fn with_add_order(mut self, order: Vec<u32>) -> Self {
        self.add_order = order;
        self
    }

    pub(crate) fn with_tag(mut self, tag: ScatterTag) -> Self {
        self.scatter_tag = tag;
        self
    }

    pub(crate) fn with_cleanup_dir(mut self, dir: PathBuf) -> Self {
        self.cleanup_dir = Some(dir);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn analysis_name(&self) -> &str {
        &self.analysis_name
    }

    pub fn add_order(&self) -> &[u32] {
        &self.add_order
    }

    pub(crate) fn set_add_order(&mut self, order: Vec<u32>) {
        self.add_order = order;
    }

    pub fn inputs(&self) -> &BTreeSet<PathBuf> {
        &self.inputs
    }

    pub fn outputs(&self) -> &BTreeSet<PathBuf> {
        &self.outputs
    }

    pub fn is_intermediate(&self) -> bool {
        self.is_intermediate
    }

    pub fn kind(&self) -> &FunctionKind {
        &self.kind
    }

    pub fn scatter_tag(&self) -> ScatterTag {
        self.scatter_tag
    }

    pub fn cleanup_dir(&self) -> Option<&Path> {
        self.cleanup_dir.as_deref()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Log file capturing the job's stdout; resolved at freeze time.
    pub fn job_output_file(&self) -> Option<&Path> {
        self.job_output_file.as_deref()
    }

    /// Log file capturing the job's stderr; resolved at freeze time.
    pub fn job_error_file(&self) -> Option<&Path> {
        self.job_error_file.as_deref()
    }

    /// Required arguments still unbound on this function.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name".to_string());
        }
        if self.outputs.is_empty() {
            missing.push("outputs".to_string());
        }
        if let FunctionKind::CommandLine(ref spec) = self.kind {
            if spec.cmd.trim().is_empty() {
                missing.push("cmd".to_string());
            }
        }
        missing
    }

    /// Irreversibly resolve dynamic fields.
    ///
    /// After freezing, the function's graph position (inputs/outputs) and
    /// log-file paths are stable. Freezing twice is an error.
    pub fn freeze(&mut self, run_dir: &Path) -> Result<()> {
        if self.frozen {
            return Err(anyhow!("function '{}' is already frozen", self.name));
        }
        if self.analysis_name.is_empty() {
            self.analysis_name = self.name.clone();
        }
        if self.job_output_file.is_none() {
            self.job_output_file = Some(run_dir.join(format!("{}.out", self.name)));
        }
        if self.job_error_file.is_none() {
            self.job_error_file = Some(run_dir.join(format!("{}.err", self.name)));
        }
        self.frozen = true;
        Ok(())
    }

    /// Whether the scatter/gather rewriter should expand this function.
    pub fn scatter_gatherable(&self) -> bool {
        match self.kind {
            FunctionKind::CommandLine(ref spec) => {
                matches!(spec.scatter, Some(ref s) if s.count > 1)
            }
            FunctionKind::InProcess(_) => false,
        }
    }

    /// The command with `{inputs}` / `{outputs}` expanded, for command-line
    /// functions.
    pub fn rendered_command(&self) -> Option<String> {
        match self.kind {
            FunctionKind::CommandLine(ref spec) => Some(
                spec.cmd
                    .replace("{inputs}", &join_paths(&self.inputs))
                    .replace("{outputs}", &join_paths(&self.outputs)),
            ),
            FunctionKind::InProcess(_) => None,
        }
    }

    /// The function's own judgment of prior completion: every output exists
    /// and the recorded content fingerprint matches.
    pub fn is_done(&self, temp_dir: &Path) -> bool {
        if self.outputs.is_empty() {
            return false;
        }
        if !self.outputs.iter().all(|p| p.exists()) {
            return false;
        }
        let store = fingerprint::FingerprintStore::new(temp_dir);
        let stored = match store.lookup(&self.name) {
            Ok(Some(hash)) => hash,
            Ok(None) => return false,
            Err(err) => {
                tracing::warn!(
                    function = %self.name,
                    error = %err,
                    "failed to read fingerprint store; treating function as not done"
                );
                return false;
            }
        };
        match fingerprint::compute_fingerprint(self.outputs.iter()) {
            Ok(current) => current == stored,
            Err(err) => {
                tracing::warn!(
                    function = %self.name,
                    error = %err,
                    "failed to hash outputs; treating function as not done"
                );
                false
            }
        }
    }

    /// Create the parent directories of every output and log file.
    pub fn prepare_directories(&self) -> Result<()> {
        let log_files = [self.job_output_file.as_ref(), self.job_error_file.as_ref()];
        for path in self.outputs.iter().chain(log_files.into_iter().flatten()) {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("creating directory {:?} for function '{}'", parent, self.name)
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Replacement subgraph for a scatter-gatherable function: one clone per
    /// shard writing under `<temp_dir>/<name>.scatter/<i>/`, plus a gather
    /// that combines the shard outputs into the declared outputs.
    ///
    /// Generated functions inherit the analysis label; their `add_order`
    /// extends the original's, so shards keep a deterministic order among
    /// themselves and the gather sorts after every shard.
    pub fn generate_functions(&self, temp_dir: &Path) -> Result<Vec<PipelineFunction>> {
        let spec = match self.kind {
            FunctionKind::CommandLine(ref spec) => spec,
            FunctionKind::InProcess(_) => {
                return Err(anyhow!(
                    "function '{}' is in-process and cannot be scattered",
                    self.name
                ))
            }
        };
        let scatter = spec
            .scatter
            .as_ref()
            .filter(|s| s.count > 1)
            .ok_or_else(|| anyhow!("function '{}' is not scatter-gatherable", self.name))?;

        let shard_root = temp_dir.join(format!("{}.scatter", self.name));
        let mut generated = Vec::with_capacity(scatter.count + 1);
        let mut shard_outputs: BTreeSet<PathBuf> = BTreeSet::new();

        for index in 0..scatter.count {
            let shard_dir = shard_root.join(format!("{:03}", index));
            let outputs: BTreeSet<PathBuf> = self
                .outputs
                .iter()
                .map(|p| shard_dir.join(file_name_of(p)))
                .collect();
            shard_outputs.extend(outputs.iter().cloned());

            let cmd = spec
                .cmd
                .replace("{scatter_index}", &index.to_string())
                .replace("{scatter_count}", &scatter.count.to_string());

            let mut clone =
                PipelineFunction::command_line(format!("{}.shard{}", self.name, index), cmd)
                    .reads(self.inputs.iter().cloned())
                    .writes(outputs)
                    .intermediate(true)
                    .analysis(self.analysis_name.clone())
                    .with_tag(ScatterTag::Clone)
                    .with_add_order(extend_order(&self.add_order, index as u32));
            if let Some(queue) = spec.queue.clone() {
                clone = clone.queue(queue);
            }
            generated.push(clone);
        }

        let gather_cmd = scatter
            .gather_cmd
            .clone()
            .unwrap_or_else(|| "cat {inputs} > {outputs}".to_string());

        let mut gather =
            PipelineFunction::command_line(format!("{}.gather", self.name), gather_cmd)
                .reads(shard_outputs)
                .writes(self.outputs.iter().cloned())
                .intermediate(self.is_intermediate)
                .analysis(self.analysis_name.clone())
                .with_tag(ScatterTag::Gather)
                .with_add_order(extend_order(&self.add_order, scatter.count as u32))
                .with_cleanup_dir(shard_root);
        if let Some(queue) = spec.queue.clone() {
            gather = gather.queue(queue);
        }
        generated.push(gather);

        Ok(generated)
    }

    /// Run the in-process computation; an error on a command-line function.
    pub fn run_in_process(&self) -> Result<()> {
        match self.kind {
            FunctionKind::InProcess(ref f) => (f.0)(),
            FunctionKind::CommandLine(_) => Err(anyhow!(
                "function '{}' is not an in-process function",
                self.name
            )),
        }
    }

    /// Human-facing display string: the description when present, otherwise
    /// the name and command.
    pub fn display(&self) -> String {
        if let Some(ref description) = self.description {
            return description.clone();
        }
        match self.kind {
            FunctionKind::CommandLine(ref spec) => format!("{}: {}", self.name, spec.cmd),
            FunctionKind::InProcess(_) => self.name.clone(),
        }
    }
}

impl fmt::Display for PipelineFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

fn join_paths(paths: &BTreeSet<PathBuf>) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn file_name_of(path: &Path) -> &std::ffi::OsStr {
    path.file_name().unwrap_or_else(|| path.as_os_str())
}

fn extend_order(parent: &[u32], index: u32) -> Vec<u32> {
    let mut order = parent.to_vec();
    order.push(index);
    order
}
