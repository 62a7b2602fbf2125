// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Top-level pipeline definition as read from a TOML file.
///
/// ```toml
/// [pipeline]
/// run_dir = "run"
/// temp_dir = ".pipedag"
///
/// [default]
/// intermediate = false
/// queue = "normal"
///
/// [function.align]
/// cmd = "bwa mem ref.fa {inputs} > {outputs}"
/// inputs = ["reads.fq"]
/// outputs = ["aligned.sam"]
/// intermediate = true
/// scatter = 4
/// gather_cmd = "cat {inputs} > {outputs}"
/// ```
///
/// All sections are optional and have reasonable defaults, except that at
/// least one `[function.<name>]` must be present (checked in `validate`).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    /// Pipeline-wide paths from `[pipeline]`.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Defaults for per-function fields from `[default]`.
    #[serde(default)]
    pub default: DefaultSection,

    /// All functions from `[function.<name>]`.
    ///
    /// Keys are the *function names* (e.g. `"align"`, `"call_variants"`).
    #[serde(default)]
    pub function: BTreeMap<String, FunctionConfig>,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PipelineSection {
    /// Directory where per-function job logs are written.
    ///
    /// Defaults to the current working directory.
    #[serde(default)]
    pub run_dir: Option<PathBuf>,

    /// Directory for scatter shards and output fingerprints.
    ///
    /// Defaults to `.pipedag`.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

/// `[default]` section.
///
/// Values here apply to functions that do not override them.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSection {
    /// Default `intermediate` flag for functions that do not set it.
    #[serde(default)]
    pub intermediate: bool,

    /// Default batch queue for functions that do not set one.
    #[serde(default)]
    pub queue: Option<String>,
}

/// `[function.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionConfig {
    /// The command to execute. `{inputs}` and `{outputs}` expand to the
    /// function's space-joined sorted file lists; `{scatter_index}` and
    /// `{scatter_count}` are substituted when the function is scattered.
    pub cmd: String,

    /// Files this function reads.
    #[serde(default)]
    pub inputs: Vec<PathBuf>,

    /// Files this function produces.
    #[serde(default)]
    pub outputs: Vec<PathBuf>,

    /// Whether the outputs are disposable intermediates.
    ///
    /// If `None`, the function uses `default.intermediate`.
    #[serde(default)]
    pub intermediate: Option<bool>,

    /// Human-facing grouping label for status reporting.
    ///
    /// Defaults to the function's table key.
    #[serde(default)]
    pub analysis: Option<String>,

    /// Free-form description, used in logs and DOT labels.
    #[serde(default)]
    pub description: Option<String>,

    /// Batch queue override for this function.
    #[serde(default)]
    pub queue: Option<String>,

    /// Shard count; a value greater than 1 makes the function
    /// scatter-gatherable.
    #[serde(default)]
    pub scatter: Option<usize>,

    /// Command that combines shard outputs into the declared outputs.
    ///
    /// Only meaningful with `scatter > 1`. When omitted, shards are
    /// concatenated with `cat` (requires exactly one output file).
    #[serde(default)]
    pub gather_cmd: Option<String>,
}

impl FunctionConfig {
    /// Effective `intermediate` value given the `[default]` section.
    pub fn effective_intermediate(&self, default_intermediate: bool) -> bool {
        self.intermediate.unwrap_or(default_intermediate)
    }

    /// Effective batch queue given the `[default]` section.
    pub fn effective_queue(&self, default_queue: Option<&str>) -> Option<String> {
        self.queue
            .clone()
            .or_else(|| default_queue.map(|q| q.to_string()))
    }

    /// Effective analysis label for a function keyed by `name`.
    pub fn effective_analysis(&self, name: &str) -> String {
        self.analysis.clone().unwrap_or_else(|| name.to_string())
    }

    /// Effective shard count; 1 means "not scattered".
    pub fn effective_scatter(&self) -> usize {
        self.scatter.unwrap_or(1)
    }
}
