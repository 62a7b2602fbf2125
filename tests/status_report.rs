use std::error::Error;

use pipedag::function::PipelineFunction;
use pipedag::graph::{expand_scatter, Graph, Status};
use pipedag::report::{render_lines, summarize, GroupStatus};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

fn set_status(graph: &mut Graph, name: &str, status: Status) {
    for id in graph.function_edge_ids() {
        let fe = graph.function_edge_mut(id).unwrap();
        if fe.function.name() == name {
            fe.status = status;
        }
    }
}

fn two_analyses() -> Result<Graph, Box<dyn Error>> {
    let mut graph = Graph::new();
    graph.add(
        PipelineFunction::command_line("align_1", "true")
            .writes(["a1.bam"])
            .analysis("Alignment"),
    )?;
    graph.add(
        PipelineFunction::command_line("align_2", "true")
            .writes(["a2.bam"])
            .analysis("Alignment"),
    )?;
    graph.add(
        PipelineFunction::command_line("call", "true")
            .reads(["a1.bam", "a2.bam"])
            .writes(["calls.vcf"])
            .analysis("Calling"),
    )?;
    graph.fill_in();
    graph.prune();
    Ok(graph)
}

#[test]
fn groups_follow_first_seen_order() -> TestResult {
    let graph = two_analyses()?;
    let groups = summarize(&graph);

    let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, ["Alignment", "Calling"]);
    assert_eq!(groups[0].main.total, 2);
    assert_eq!(groups[1].main.total, 1);

    Ok(())
}

#[test]
fn group_status_derivation() -> TestResult {
    let mut graph = two_analyses()?;

    // Nothing has run yet.
    assert_eq!(summarize(&graph)[0].status(), GroupStatus::Pending);

    // One of two aligners finished: the group is effectively running.
    set_status(&mut graph, "align_1", Status::Done);
    assert_eq!(summarize(&graph)[0].status(), GroupStatus::Running);

    set_status(&mut graph, "align_2", Status::Done);
    assert_eq!(summarize(&graph)[0].status(), GroupStatus::Done);

    set_status(&mut graph, "align_2", Status::Skipped);
    assert_eq!(summarize(&graph)[0].status(), GroupStatus::Skipped);

    set_status(&mut graph, "align_2", Status::Failed);
    assert_eq!(summarize(&graph)[0].status(), GroupStatus::Failed);

    Ok(())
}

#[test]
fn lines_pad_names_and_centre_status() -> TestResult {
    let mut graph = two_analyses()?;
    set_status(&mut graph, "align_1", Status::Done);
    set_status(&mut graph, "align_2", Status::Done);

    let lines = render_lines(&summarize(&graph));
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "Alignment [ DONE  ]");
    assert_eq!(lines[1], "Calling   [PENDING]");

    Ok(())
}

#[test]
fn scatter_counts_appear_when_fanned_out() -> TestResult {
    let dir = tempdir()?;
    let temp_dir = dir.path().join(".pipedag");

    let mut graph = Graph::with_run_dir(dir.path());
    graph.add(
        PipelineFunction::command_line("count", "echo {scatter_index} > {outputs}")
            .writes([dir.path().join("counts.txt")])
            .scatter(3),
    )?;
    graph.fill_in();
    graph.prune();
    expand_scatter(&mut graph, &temp_dir)?;

    set_status(&mut graph, "count.shard0", Status::Done);
    set_status(&mut graph, "count.shard1", Status::Failed);

    let groups = summarize(&graph);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].scatter.total, 3);
    assert_eq!(groups[0].scatter.done, 1);
    assert_eq!(groups[0].scatter.failed, 1);
    assert_eq!(groups[0].gather.total, 1);

    let lines = render_lines(&groups);
    assert!(lines[0].contains("s:3t/1d/1f"));
    // A single gather is not a fan-out worth reporting.
    assert!(!lines[0].contains("g:"));

    Ok(())
}
