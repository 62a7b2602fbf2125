use std::error::Error;
use std::fs;
use std::path::Path;

use tempfile::tempdir;

use pipedag::fingerprint::{compute_fingerprint, FingerprintStore};
use pipedag::function::PipelineFunction;
use pipedag::graph::{apply_restart_analysis, Graph, Status};

type TestResult = Result<(), Box<dyn Error>>;

/// A(intermediate) -> B(terminal), with outputs under `dir`.
fn chain(dir: &Path) -> Result<Graph, Box<dyn Error>> {
    let a_out = dir.join("a.txt");
    let b_out = dir.join("b.txt");

    let mut graph = Graph::with_run_dir(dir);
    graph.add(
        PipelineFunction::command_line("A", "echo a > {outputs}")
            .writes([a_out.clone()])
            .intermediate(true),
    )?;
    graph.add(
        PipelineFunction::command_line("B", "cat {inputs} > {outputs}")
            .reads([a_out])
            .writes([b_out]),
    )?;
    graph.fill_in();
    graph.prune();
    Ok(graph)
}

fn status_of(graph: &Graph, name: &str) -> Status {
    graph
        .function_edge_ids()
        .into_iter()
        .map(|id| graph.function_edge(id).unwrap())
        .find(|fe| fe.function.name() == name)
        .map(|fe| fe.status)
        .unwrap()
}

fn mark_done(temp_dir: &Path, name: &str, outputs: &[&Path]) -> TestResult {
    for path in outputs {
        fs::write(path, format!("{name} output"))?;
    }
    let hash = compute_fingerprint(outputs.iter())?;
    FingerprintStore::new(temp_dir).record(name, &hash)?;
    Ok(())
}

#[test]
fn intermediate_is_skipped_when_downstream_is_done() -> TestResult {
    let dir = tempdir()?;
    let temp_dir = dir.path().join(".pipedag");
    fs::create_dir_all(&temp_dir)?;

    let mut graph = chain(dir.path())?;

    // Only B's outputs survive on disk; the intermediate was cleaned up.
    mark_done(&temp_dir, "B", &[&dir.path().join("b.txt")])?;

    apply_restart_analysis(&mut graph, &temp_dir, false)?;

    assert_eq!(status_of(&graph, "A"), Status::Skipped);
    assert_eq!(status_of(&graph, "B"), Status::Done);

    Ok(())
}

#[test]
fn skipped_intermediate_is_revived_when_downstream_must_run() -> TestResult {
    let dir = tempdir()?;
    let temp_dir = dir.path().join(".pipedag");
    fs::create_dir_all(&temp_dir)?;

    let mut graph = chain(dir.path())?;

    // Nothing on disk: B must run, which pulls the skipped A back in.
    apply_restart_analysis(&mut graph, &temp_dir, false)?;

    assert_eq!(status_of(&graph, "A"), Status::Pending);
    assert_eq!(status_of(&graph, "B"), Status::Pending);

    Ok(())
}

#[test]
fn done_intermediate_stays_done() -> TestResult {
    let dir = tempdir()?;
    let temp_dir = dir.path().join(".pipedag");
    fs::create_dir_all(&temp_dir)?;

    let mut graph = chain(dir.path())?;

    mark_done(&temp_dir, "A", &[&dir.path().join("a.txt")])?;
    mark_done(&temp_dir, "B", &[&dir.path().join("b.txt")])?;

    apply_restart_analysis(&mut graph, &temp_dir, false)?;

    assert_eq!(status_of(&graph, "A"), Status::Done);
    assert_eq!(status_of(&graph, "B"), Status::Done);

    Ok(())
}

#[test]
fn start_clean_forces_everything_pending() -> TestResult {
    let dir = tempdir()?;
    let temp_dir = dir.path().join(".pipedag");
    fs::create_dir_all(&temp_dir)?;

    let mut graph = chain(dir.path())?;

    mark_done(&temp_dir, "A", &[&dir.path().join("a.txt")])?;
    mark_done(&temp_dir, "B", &[&dir.path().join("b.txt")])?;

    apply_restart_analysis(&mut graph, &temp_dir, true)?;

    assert_eq!(status_of(&graph, "A"), Status::Pending);
    assert_eq!(status_of(&graph, "B"), Status::Pending);

    Ok(())
}

#[test]
fn stale_fingerprint_means_not_done() -> TestResult {
    let dir = tempdir()?;
    let temp_dir = dir.path().join(".pipedag");
    fs::create_dir_all(&temp_dir)?;

    let mut graph = chain(dir.path())?;

    mark_done(&temp_dir, "B", &[&dir.path().join("b.txt")])?;
    // The output changed after the fingerprint was recorded.
    fs::write(dir.path().join("b.txt"), "edited by hand")?;

    apply_restart_analysis(&mut graph, &temp_dir, false)?;

    assert_eq!(status_of(&graph, "A"), Status::Pending);
    assert_eq!(status_of(&graph, "B"), Status::Pending);

    Ok(())
}
