// src/graph/restart.rs

//! Restart analysis: decide, once, before the first scheduling tick, which
//! function edges can be skipped and which must run.
//!
//! Each edge's preloaded status (the function's own `is_done` judgment) is
//! treated as ground truth; this pass only performs the graph-walk reasoning
//! on top of it. SKIPPED is only ever assigned or revoked here; the
//! scheduling loop never revisits skip decisions.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};

use crate::graph::build::Graph;
use crate::graph::edge::{EdgeId, Status};

/// Classify every function edge as DONE, SKIPPED or PENDING.
///
/// With `start_clean`, every edge is forced to PENDING regardless of what is
/// on disk. Otherwise edges are preloaded from `is_done()` and then walked in
/// topological order:
///
/// - an intermediate function is SKIPPED unless it is already DONE;
/// - any other function stays DONE only if its own outputs are done *and*
///   every previous function is DONE or SKIPPED — otherwise it is reset to
///   PENDING and every SKIPPED ancestor is resurrected to PENDING, since its
///   outputs are needed again.
pub fn apply_restart_analysis(
    graph: &mut Graph,
    temp_dir: &Path,
    start_clean: bool,
) -> Result<()> {
    let ids = graph.function_edge_ids();

    if start_clean {
        info!("starting from scratch; all functions forced to PENDING");
        for id in ids {
            set_status(graph, id, Status::Pending);
        }
        return Ok(());
    }

    for &id in &ids {
        let fe = graph.function_edge(id).expect("live function edge");
        let status = if fe.function.is_done(temp_dir) {
            Status::Done
        } else {
            Status::Pending
        };
        set_status(graph, id, status);
    }

    for id in graph.topo_function_edges()? {
        check_done(graph, id);
    }
    Ok(())
}

fn check_done(graph: &mut Graph, id: EdgeId) {
    let fe = graph.function_edge(id).expect("live function edge");

    if fe.function.is_intermediate() {
        // Intermediates are presumed disposable; only downstream demand
        // brings them back.
        if fe.status != Status::Done {
            debug!(function = %fe.function.name(), "intermediate outputs not needed yet; skipping");
            set_status(graph, id, Status::Skipped);
        }
        return;
    }

    let previous = graph.previous_functions(id);
    let settled = previous.iter().all(|&p| {
        matches!(
            graph.function_edge(p).map(|e| e.status),
            Some(Status::Done) | Some(Status::Skipped)
        )
    });

    let done = fe.status == Status::Done && settled;
    if !done {
        let name = graph
            .function_edge(id)
            .expect("live function edge")
            .function
            .name()
            .to_string();
        debug!(function = %name, "function must run in this invocation");
        set_status(graph, id, Status::Pending);
        reset_previous_skipped(graph, id);
    }
}

/// A SKIPPED ancestor of an edge that must run is needed again: flip it back
/// to PENDING and repeat upward.
fn reset_previous_skipped(graph: &mut Graph, id: EdgeId) {
    let mut stack = graph.previous_functions(id);
    let mut visited: HashSet<EdgeId> = HashSet::new();

    while let Some(previous) = stack.pop() {
        if !visited.insert(previous) {
            continue;
        }
        let Some(fe) = graph.function_edge(previous) else { continue };
        if fe.status == Status::Skipped {
            debug!(
                function = %fe.function.name(),
                "skipped intermediate is needed by a downstream function; reviving"
            );
            set_status(graph, previous, Status::Pending);
            stack.extend(graph.previous_functions(previous));
        }
    }
}

fn set_status(graph: &mut Graph, id: EdgeId, status: Status) {
    if let Some(fe) = graph.function_edge_mut(id) {
        fe.status = status;
    }
}
