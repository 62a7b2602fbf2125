// src/graph/dot.rs

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::graph::build::Graph;
use crate::graph::edge::Edge;
use crate::graph::node::NodeId;

/// Render the graph in DOT format.
///
/// Node ids are assigned sequentially over the live nodes; function edges are
/// labeled with the function's display string, mapping edges drawn dashed.
pub fn write_dot(graph: &Graph, path: &Path) -> Result<()> {
    let mut out = String::new();
    writeln!(out, "digraph pipedag {{")?;

    let mut dot_ids: HashMap<NodeId, usize> = HashMap::new();
    for (index, node) in graph.live_node_ids().into_iter().enumerate() {
        dot_ids.insert(node, index);
        writeln!(
            out,
            "    n{} [label=\"{}\"];",
            index,
            escape(&graph.node(node).to_string())
        )?;
    }

    for id in graph.edge_ids() {
        let edge = graph.edge(id).expect("live edge");
        let source = dot_ids[&edge.source()];
        let target = dot_ids[&edge.target()];
        match edge {
            Edge::Function(fe) => writeln!(
                out,
                "    n{} -> n{} [label=\"{}\"];",
                source,
                target,
                escape(&fe.function.display())
            )?,
            Edge::Mapping(_) => {
                writeln!(out, "    n{} -> n{} [style=dashed];", source, target)?
            }
        }
    }

    writeln!(out, "}}")?;
    fs::write(path, out).with_context(|| format!("writing DOT graph to {:?}", path))?;
    Ok(())
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}
