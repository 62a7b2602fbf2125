// src/graph/scatter.rs

use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};

use crate::graph::build::Graph;

/// Rewrite every scatter-gatherable function edge into its generated
/// subgraph (shard clones plus a gather).
///
/// Invoked at most once per run, and only after validation reported zero
/// missing values. Returns the number of functions that were rewritten.
pub fn expand_scatter(graph: &mut Graph, temp_dir: &Path) -> Result<usize> {
    let targets: Vec<_> = graph
        .function_edge_ids()
        .into_iter()
        .filter(|&id| {
            graph
                .function_edge(id)
                .is_some_and(|fe| fe.function.scatter_gatherable())
        })
        .collect();

    if targets.is_empty() {
        debug!("no scatter-gatherable functions; graph left unchanged");
        return Ok(0);
    }

    let mut replacements = Vec::with_capacity(targets.len());
    for &id in &targets {
        let fe = graph.function_edge(id).expect("live function edge");
        let generated = fe.function.generate_functions(temp_dir)?;
        info!(
            function = %fe.function.name(),
            replacements = generated.len(),
            "expanding scatter-gatherable function"
        );
        replacements.push(generated);
    }

    for id in targets {
        graph.remove_edge(id);
    }
    graph.prune();

    let rewritten = replacements.len();
    for generated in replacements {
        for function in generated {
            graph.add(function)?;
        }
    }
    graph.fill_in();
    graph.prune();

    Ok(rewritten)
}
