use std::error::Error;

use pipedag::function::PipelineFunction;
use pipedag::graph::{validate, Graph, Status};

type TestResult = Result<(), Box<dyn Error>>;

fn diamond() -> Result<Graph, Box<dyn Error>> {
    let mut graph = Graph::new();

    graph.add(PipelineFunction::command_line("A", "true").writes(["a.txt"]))?;
    graph.add(
        PipelineFunction::command_line("B", "true")
            .reads(["a.txt"])
            .writes(["b.txt"]),
    )?;
    graph.add(
        PipelineFunction::command_line("C", "true")
            .reads(["a.txt"])
            .writes(["c.txt"]),
    )?;
    graph.add(
        PipelineFunction::command_line("D", "true")
            .reads(["b.txt", "c.txt"])
            .writes(["d.txt"]),
    )?;

    graph.fill_in();
    graph.prune();
    Ok(graph)
}

#[test]
fn diamond_builds_expected_shape() -> TestResult {
    let graph = diamond()?;

    let functions = graph.function_edge_ids();
    assert_eq!(functions.len(), 4);

    // D's input set {b.txt, c.txt} decomposes into two element nodes, so the
    // graph carries two mapping edges on top of the four function edges.
    assert_eq!(graph.edge_ids().len(), 6);

    // Nodes: {} (A's inputs), {a}, {b}, {c}, {b,c}, {d}.
    assert_eq!(graph.node_count(), 6);

    Ok(())
}

#[test]
fn previous_functions_walk_through_mapping_edges() -> TestResult {
    let graph = diamond()?;

    let names_of = |ids: Vec<pipedag::graph::EdgeId>| -> Vec<String> {
        ids.into_iter()
            .map(|id| graph.function_edge(id).unwrap().function.name().to_string())
            .collect()
    };

    let functions = graph.function_edge_ids();
    let d = *functions.last().unwrap();
    let mut previous = names_of(graph.previous_functions(d));
    previous.sort();
    assert_eq!(previous, ["B", "C"]);

    let a = functions[0];
    assert!(graph.previous_functions(a).is_empty());

    Ok(())
}

#[test]
fn topological_order_is_deterministic() -> TestResult {
    let order_names = |graph: &Graph| -> Vec<String> {
        graph
            .topo_function_edges()
            .unwrap()
            .into_iter()
            .map(|id| graph.function_edge(id).unwrap().function.name().to_string())
            .collect()
    };

    let first = diamond()?;
    let second = diamond()?;

    let order = order_names(&first);
    assert_eq!(order, order_names(&second));
    assert_eq!(order, ["A", "B", "C", "D"]);

    Ok(())
}

#[test]
fn function_edge_displaces_redundant_mapping_edges() -> TestResult {
    let mut graph = Graph::new();

    // P writes {x, y}; Q reads just {x}. fill_in exposes the indirect
    // dependency as {x,y} -> {x}.
    graph.add(PipelineFunction::command_line("P", "true").writes(["x", "y"]))?;
    graph.add(
        PipelineFunction::command_line("Q", "true")
            .reads(["x"])
            .writes(["q.out"]),
    )?;
    graph.fill_in();
    graph.prune();

    let mapping_edges = graph
        .edge_ids()
        .into_iter()
        .filter(|&id| graph.edge(id).unwrap().is_mapping())
        .count();
    assert_eq!(mapping_edges, 1);

    // A later function running {x,y} -> {x} directly makes that mapping
    // redundant; add() removes it.
    graph.add(
        PipelineFunction::command_line("R", "true")
            .reads(["x", "y"])
            .writes(["x"]),
    )?;

    let mapping_edges = graph
        .edge_ids()
        .into_iter()
        .filter(|&id| graph.edge(id).unwrap().is_mapping())
        .count();
    assert_eq!(mapping_edges, 0);

    Ok(())
}

#[test]
fn prune_removes_filler_mappings_until_fixpoint() -> TestResult {
    let mut graph = Graph::new();

    // One producer of a multi-file set with no consumers at all: fill_in
    // creates set -> element mappings, and prune must take every one of
    // them back out.
    graph.add(PipelineFunction::command_line("P", "true").writes(["x", "y", "z"]))?;
    graph.fill_in();
    graph.prune();

    assert_eq!(graph.edge_ids().len(), 1);
    assert_eq!(graph.node_count(), 2);

    Ok(())
}

#[test]
fn statuses_start_pending() -> TestResult {
    let graph = diamond()?;
    for id in graph.function_edge_ids() {
        assert_eq!(graph.function_edge(id).unwrap().status, Status::Pending);
    }
    Ok(())
}

#[test]
fn validate_counts_missing_values() -> TestResult {
    let mut graph = Graph::new();
    graph.add(PipelineFunction::command_line("broken", "").reads(["x"]))?;

    let missing = validate(&graph)?;
    assert_eq!(missing, 2); // no outputs, empty cmd

    Ok(())
}

#[test]
fn validate_rejects_cycles() -> TestResult {
    let mut graph = Graph::new();
    graph.add(
        PipelineFunction::command_line("forward", "true")
            .reads(["x"])
            .writes(["y"]),
    )?;
    graph.add(
        PipelineFunction::command_line("backward", "true")
            .reads(["y"])
            .writes(["x"]),
    )?;
    graph.fill_in();
    graph.prune();

    let err = validate(&graph).unwrap_err();
    assert!(err.to_string().contains("cycles were detected"));

    Ok(())
}

#[test]
fn add_order_breaks_ties_deterministically() -> TestResult {
    // Two independent functions: readiness order must follow declaration
    // order, not map iteration order.
    let mut graph = Graph::new();
    graph.add(PipelineFunction::command_line("zeta", "true").writes(["z.out"]))?;
    graph.add(PipelineFunction::command_line("alpha", "true").writes(["a.out"]))?;

    let order: Vec<&str> = graph
        .function_edge_ids()
        .into_iter()
        .map(|id| graph.function_edge(id).unwrap().function.name())
        .collect();
    assert_eq!(order, ["zeta", "alpha"]);

    Ok(())
}
