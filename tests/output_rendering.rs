use std::error::Error;
use std::fs;

use tempfile::tempdir;

use pipedag::function::PipelineFunction;
use pipedag::graph::{dot::write_dot, Graph, Status};
use pipedag::report::notify::{failure_body, status_body};

type TestResult = Result<(), Box<dyn Error>>;

fn small_graph() -> Result<Graph, Box<dyn Error>> {
    let mut graph = Graph::with_run_dir("logs");
    graph.add(
        PipelineFunction::command_line("first", "echo 1 > {outputs}")
            .writes(["one.txt"])
            .describe("produce the first file"),
    )?;
    graph.add(
        PipelineFunction::command_line("second", "cat {inputs} > {outputs}")
            .reads(["one.txt"])
            .writes(["two.txt"]),
    )?;
    graph.fill_in();
    graph.prune();
    Ok(graph)
}

#[test]
fn dot_output_lists_nodes_and_labeled_edges() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("graph.dot");

    let graph = small_graph()?;
    write_dot(&graph, &path)?;

    let rendered = fs::read_to_string(&path)?;
    assert!(rendered.starts_with("digraph pipedag {"));
    assert!(rendered.trim_end().ends_with('}'));
    assert!(rendered.contains("label=\"one.txt\""));
    assert!(rendered.contains("label=\"produce the first file\""));
    assert!(rendered.contains("label=\"second: cat {inputs} > {outputs}\""));

    Ok(())
}

#[test]
fn failure_body_names_the_function_and_its_logs() -> TestResult {
    let mut graph = small_graph()?;

    let failed: Vec<_> = graph
        .function_edge_ids()
        .into_iter()
        .filter(|&id| graph.function_edge(id).unwrap().function.name() == "second")
        .collect();
    for &id in &failed {
        graph.function_edge_mut(id).unwrap().status = Status::Failed;
    }

    let body = failure_body(&graph, &failed);
    assert!(body.contains("second"));
    assert!(body.contains("logs/second.out"));
    assert!(body.contains("logs/second.err"));

    Ok(())
}

#[test]
fn status_body_appends_failures_to_the_summary() -> TestResult {
    let mut graph = small_graph()?;

    for id in graph.function_edge_ids() {
        let fe = graph.function_edge_mut(id).unwrap();
        fe.status = if fe.function.name() == "first" {
            Status::Done
        } else {
            Status::Failed
        };
    }

    let body = status_body(&graph);
    assert!(body.contains("first"));
    assert!(body.contains("FAILED"));
    assert!(body.contains("failed functions:"));
    assert!(body.contains("logs/second.err"));

    Ok(())
}
