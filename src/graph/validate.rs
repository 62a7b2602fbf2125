// src/graph/validate.rs

use anyhow::{anyhow, Result};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::{error, warn};

use crate::graph::build::Graph;

/// Validate the graph before execution.
///
/// - Every function edge is asked for its `missing_fields()`; each missing
///   value is logged and counted. A nonzero count means "not ready to run,
///   dry-run only" and is returned to the caller.
/// - The node graph is checked for cycles; every cycle is logged, and any
///   cycle is a fatal error.
pub fn validate(graph: &Graph) -> Result<usize> {
    let missing = count_missing_values(graph);
    detect_cycles(graph)?;
    Ok(missing)
}

fn count_missing_values(graph: &Graph) -> usize {
    let mut missing = 0usize;
    for id in graph.function_edge_ids() {
        let fe = graph.function_edge(id).expect("live function edge");
        for field in fe.function.missing_fields() {
            warn!(
                function = %fe.function.name(),
                field = %field,
                "function is missing a required value"
            );
            missing += 1;
        }
    }
    missing
}

fn detect_cycles(graph: &Graph) -> Result<()> {
    // Mirror the node graph into petgraph; edge multiplicity is irrelevant
    // for cycle detection.
    let mut mirror: DiGraphMap<usize, ()> = DiGraphMap::new();

    for node in graph.live_node_ids() {
        mirror.add_node(node.index());
    }
    for id in graph.edge_ids() {
        let edge = graph.edge(id).expect("live edge");
        mirror.add_edge(edge.source().index(), edge.target().index(), ());
    }

    let mut found = false;
    for component in tarjan_scc(&mirror) {
        let cyclic = component.len() > 1
            || (component.len() == 1 && mirror.contains_edge(component[0], component[0]));
        if cyclic {
            found = true;
            let rendered = component
                .iter()
                .map(|&n| {
                    graph
                        .node(crate::graph::node::NodeId(n))
                        .to_string()
                })
                .collect::<Vec<_>>()
                .join(" -> ");
            error!(cycle = %rendered, "cycle detected among file sets");
        }
    }

    if found {
        return Err(anyhow!("cycles were detected in the graph"));
    }
    Ok(())
}
