use std::collections::HashSet;

use proptest::prelude::*;

use pipedag::function::PipelineFunction;
use pipedag::graph::{validate, EdgeId, Graph};

/// Strategy for acyclic pipelines: function `i` may read any outputs of
/// functions `0..i` and always writes two fresh files, so multi-file sets
/// (and therefore mapping edges) show up regularly.
fn pipeline_strategy(max_functions: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_functions).prop_flat_map(|count| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..4),
            count,
        )
    })
}

fn build_graph(raw_deps: &[Vec<usize>]) -> Graph {
    let mut graph = Graph::new();

    for (i, potential_deps) in raw_deps.iter().enumerate() {
        // Sanitize dependencies: only allow reads from earlier functions.
        let mut inputs: HashSet<String> = HashSet::new();
        for dep in potential_deps {
            if i > 0 {
                let producer = dep % i;
                // Read one of the producer's two outputs.
                inputs.insert(format!("file_{}_{}.dat", producer, dep % 2));
            }
        }

        let function = PipelineFunction::command_line(format!("task_{i}"), "true")
            .reads(inputs)
            .writes([format!("file_{i}_0.dat"), format!("file_{i}_1.dat")]);
        graph.add(function).expect("acyclic add never fails");
    }

    graph.fill_in();
    graph.prune();
    graph
}

/// Walk downstream from a node until a function edge is found.
fn has_function_descendant(graph: &Graph, start: pipedag::graph::NodeId) -> bool {
    let mut stack = vec![start];
    let mut seen = HashSet::new();

    while let Some(node) = stack.pop() {
        if !seen.insert(node) {
            continue;
        }
        for id in graph.outgoing_edges(node) {
            let edge = graph.edge(id).unwrap();
            if edge.is_mapping() {
                stack.push(edge.target());
            } else {
                return true;
            }
        }
    }
    false
}

/// Walk upstream from a node until a function edge is found.
fn has_function_ancestor(graph: &Graph, start: pipedag::graph::NodeId) -> bool {
    let mut stack = vec![start];
    let mut seen = HashSet::new();

    while let Some(node) = stack.pop() {
        if !seen.insert(node) {
            continue;
        }
        for id in graph.incoming_edges(node) {
            let edge = graph.edge(id).unwrap();
            if edge.is_mapping() {
                stack.push(edge.source());
            } else {
                return true;
            }
        }
    }
    false
}

proptest! {
    /// Acyclic declarations never trip the cycle detector, and complete
    /// functions never report missing values.
    #[test]
    fn acyclic_pipelines_always_validate(raw_deps in pipeline_strategy(10)) {
        let graph = build_graph(&raw_deps);
        let missing = validate(&graph).expect("no cycles in an acyclic pipeline");
        prop_assert_eq!(missing, 0);
    }

    /// After fill_in + prune, every surviving mapping edge is load-bearing:
    /// it has a function-edge ancestor and a function-edge descendant.
    #[test]
    fn pruned_mapping_edges_are_load_bearing(raw_deps in pipeline_strategy(10)) {
        let graph = build_graph(&raw_deps);

        for id in graph.edge_ids() {
            let edge = graph.edge(id).unwrap();
            if !edge.is_mapping() {
                continue;
            }
            prop_assert!(
                has_function_ancestor(&graph, edge.source()),
                "mapping edge without a producer survived pruning"
            );
            prop_assert!(
                has_function_descendant(&graph, edge.target()),
                "mapping edge without a consumer survived pruning"
            );
        }
    }

    /// Dependency order holds in the topological plan: a function always
    /// sorts after every function it reads from.
    #[test]
    fn topological_plan_respects_dependencies(raw_deps in pipeline_strategy(10)) {
        let graph = build_graph(&raw_deps);
        let order = graph.topo_function_edges().expect("acyclic");

        let position = |id: EdgeId| order.iter().position(|&o| o == id).unwrap();

        for &id in &order {
            for previous in graph.previous_functions(id) {
                prop_assert!(position(previous) < position(id));
            }
        }
    }
}
