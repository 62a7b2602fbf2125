// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod exec;
pub mod fingerprint;
pub mod function;
pub mod graph;
pub mod logging;
pub mod report;

/// Crate-wide error aliases. Fatal graph conditions (cycles, construction
/// failures, unknown runner types) surface through these rather than being
/// used as control flow.
pub use anyhow::{Error, Result};

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tracing::{debug, error, info};

use crate::cli::{CliArgs, JobRunnerKind};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{Runtime, RuntimeOptions};
use crate::exec::Backend;
use crate::function::{FunctionKind, PipelineFunction};
use crate::graph::{apply_restart_analysis, dot, expand_scatter, validate, Graph};
use crate::report::notify::Notifier;
use crate::report::{render_lines, summarize};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline loading and validation
/// - graph construction: add → fill_in → prune → validate
/// - scatter/gather expansion
/// - dry-run printing or restart analysis + the scheduling loop
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    let run_dir = args
        .run_dir
        .clone()
        .or_else(|| cfg.pipeline.run_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let temp_dir = args
        .temp_dir
        .clone()
        .or_else(|| cfg.pipeline.temp_dir.clone())
        .unwrap_or_else(|| PathBuf::from(".pipedag"));

    let mut graph = Graph::with_run_dir(&run_dir);
    for function in functions_from_config(&cfg) {
        graph.add(function)?;
    }
    graph.fill_in();
    graph.prune();

    if let Some(ref path) = args.dot {
        dot::write_dot(&graph, path)?;
        info!(path = %path.display(), "wrote dependency graph");
    }

    let missing = validate(&graph)?;

    if missing > 0 {
        print_dry_run(&graph)?;
        return Err(anyhow!(
            "{missing} required value(s) are missing; not ready to run"
        ));
    }

    if !args.no_scatter {
        let rewritten = expand_scatter(&mut graph, &temp_dir)?;
        if rewritten > 0 {
            validate(&graph)?;
        }
    }

    if let Some(ref path) = args.expanded_dot {
        dot::write_dot(&graph, path)?;
        info!(path = %path.display(), "wrote expanded dependency graph");
    }

    if !args.run {
        print_dry_run(&graph)?;
        return Ok(());
    }

    fs::create_dir_all(&run_dir)
        .with_context(|| format!("creating run directory {:?}", run_dir))?;
    fs::create_dir_all(&temp_dir)
        .with_context(|| format!("creating temp directory {:?}", temp_dir))?;

    apply_restart_analysis(&mut graph, &temp_dir, args.start_from_scratch)?;

    let notifier = Notifier::new(
        args.status_email_to.clone(),
        args.status_email_from.clone(),
    );
    let options = RuntimeOptions {
        backend: backend_from_cli(args.effective_job_runner()),
        job_queue: args.job_queue.clone(),
        temp_dir,
        poll_interval: Duration::from_secs(args.poll_interval),
    };

    let mut runtime = Runtime::new(graph, options, notifier);
    let outcome = runtime.run().await?;

    for line in render_lines(&summarize(runtime.graph())) {
        info!("{line}");
    }

    if !outcome.failed.is_empty() {
        error!(failed = ?outcome.failed, "pipeline finished with failures");
        return Err(anyhow!("{} function(s) failed", outcome.failed.len()));
    }

    info!("pipeline finished");
    Ok(())
}

fn backend_from_cli(kind: JobRunnerKind) -> Backend {
    match kind {
        JobRunnerKind::Shell => Backend::Shell,
        JobRunnerKind::Lsf => Backend::Lsf,
        JobRunnerKind::Gridengine => Backend::GridEngine,
    }
}

/// Turn the declarative pipeline file into pipeline functions.
fn functions_from_config(cfg: &ConfigFile) -> Vec<PipelineFunction> {
    let default_intermediate = cfg.default.intermediate;
    let default_queue = cfg.default.queue.as_deref();

    cfg.function
        .iter()
        .map(|(name, fc)| {
            let mut function = PipelineFunction::command_line(name.as_str(), fc.cmd.as_str())
                .reads(fc.inputs.iter().cloned())
                .writes(fc.outputs.iter().cloned())
                .intermediate(fc.effective_intermediate(default_intermediate))
                .analysis(fc.effective_analysis(name));

            if let Some(ref description) = fc.description {
                function = function.describe(description);
            }
            if let Some(queue) = fc.effective_queue(default_queue) {
                function = function.queue(queue);
            }
            if fc.effective_scatter() > 1 {
                function = function.scatter(fc.effective_scatter());
                if let Some(ref gather) = fc.gather_cmd {
                    function = function.gather_cmd(gather);
                }
            }
            function
        })
        .collect()
}

/// Simple dry-run output: the execution plan in dependency order.
fn print_dry_run(graph: &Graph) -> Result<()> {
    let order = graph.topo_function_edges()?;

    println!("pipedag dry-run");
    println!("functions ({}):", order.len());

    for id in order {
        let fe = graph.function_edge(id).expect("live function edge");
        let function = &fe.function;

        println!("  - {}", function.name());
        match function.kind() {
            FunctionKind::CommandLine(spec) => println!("      cmd: {}", spec.cmd),
            FunctionKind::InProcess(_) => println!("      in-process"),
        }
        if !function.inputs().is_empty() {
            println!("      inputs: {:?}", function.inputs());
        }
        println!("      outputs: {:?}", function.outputs());
        if function.is_intermediate() {
            println!("      intermediate: true");
        }
        if function.analysis_name() != function.name() {
            println!("      analysis: {}", function.analysis_name());
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
