use std::error::Error;
use std::fs;
use std::time::Duration;

use tempfile::tempdir;

use pipedag::engine::{Runtime, RuntimeOptions};
use pipedag::exec::Backend;
use pipedag::function::{PipelineFunction, ScatterTag};
use pipedag::graph::{expand_scatter, validate, Graph};
use pipedag::report::Notifier;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn rewriter_replaces_the_original_edge() -> TestResult {
    let dir = tempdir()?;
    let root = dir.path();
    let temp_dir = root.join(".pipedag");

    let mut graph = Graph::with_run_dir(root);
    graph.add(
        PipelineFunction::command_line("count", "echo shard {scatter_index} > {outputs}")
            .writes([root.join("counts.txt")])
            .scatter(4),
    )?;
    graph.fill_in();
    graph.prune();
    assert_eq!(graph.function_edge_ids().len(), 1);

    let rewritten = expand_scatter(&mut graph, &temp_dir)?;
    assert_eq!(rewritten, 1);

    let functions = graph.function_edge_ids();
    assert_eq!(functions.len(), 5); // 4 clones + 1 gather

    let mut clones = 0;
    let mut gathers = 0;
    for id in &functions {
        let fe = graph.function_edge(*id).unwrap();
        match fe.function.scatter_tag() {
            ScatterTag::Clone => {
                clones += 1;
                assert!(fe.function.is_intermediate());
            }
            ScatterTag::Gather => {
                gathers += 1;
                assert_eq!(fe.function.outputs().len(), 1);
                assert_eq!(fe.function.inputs().len(), 4);
            }
            ScatterTag::None => panic!("original edge should have been replaced"),
        }
        // All shards and the gather report under one analysis label.
        assert_eq!(fe.function.analysis_name(), "count");
    }
    assert_eq!(clones, 4);
    assert_eq!(gathers, 1);

    validate(&graph)?;
    Ok(())
}

#[test]
fn gather_waits_for_every_shard() -> TestResult {
    let dir = tempdir()?;
    let root = dir.path();
    let temp_dir = root.join(".pipedag");

    let mut graph = Graph::with_run_dir(root);
    graph.add(
        PipelineFunction::command_line("count", "echo shard {scatter_index} > {outputs}")
            .writes([root.join("counts.txt")])
            .scatter(3),
    )?;
    graph.fill_in();
    graph.prune();
    expand_scatter(&mut graph, &temp_dir)?;

    let functions = graph.function_edge_ids();
    let gather = functions
        .iter()
        .find(|&&id| {
            graph.function_edge(id).unwrap().function.scatter_tag() == ScatterTag::Gather
        })
        .copied()
        .unwrap();

    // The gather depends on all three shard clones, through the mapping
    // edges of its input set.
    let mut previous: Vec<String> = graph
        .previous_functions(gather)
        .into_iter()
        .map(|id| graph.function_edge(id).unwrap().function.name().to_string())
        .collect();
    previous.sort();
    assert_eq!(previous, ["count.shard0", "count.shard1", "count.shard2"]);

    Ok(())
}

#[tokio::test]
async fn scattered_function_runs_shards_then_gathers() -> TestResult {
    let dir = tempdir()?;
    let root = dir.path();
    let temp_dir = root.join(".pipedag");

    let mut graph = Graph::with_run_dir(root);
    graph.add(
        PipelineFunction::command_line("count", "echo shard {scatter_index} > {outputs}")
            .writes([root.join("counts.txt")])
            .scatter(3),
    )?;
    graph.fill_in();
    graph.prune();
    expand_scatter(&mut graph, &temp_dir)?;

    let options = RuntimeOptions {
        backend: Backend::Shell,
        job_queue: None,
        temp_dir: temp_dir.clone(),
        poll_interval: Duration::from_millis(50),
    };
    let mut runtime = Runtime::new(graph, options, Notifier::disabled());
    let outcome = runtime.run().await?;

    assert!(outcome.failed.is_empty());

    let combined = fs::read_to_string(root.join("counts.txt"))?;
    let lines: Vec<&str> = combined.lines().collect();
    assert_eq!(lines, ["shard 0", "shard 1", "shard 2"]);

    // The gather cleans up its shard directory once it has finished.
    assert!(!temp_dir.join("count.scatter").exists());

    Ok(())
}
