// src/graph/mod.rs

//! The file/function dependency graph.
//!
//! - [`node`] defines file-set identity nodes.
//! - [`edge`] defines function and mapping edges plus the runtime status.
//! - [`build`] holds the graph itself: insertion, mapping fill-in, pruning,
//!   adjacency and topological queries.
//! - [`validate`] checks missing required values and detects cycles.
//! - [`scatter`] rewrites scatter-gatherable functions into shard subgraphs.
//! - [`restart`] classifies edges as DONE/SKIPPED/PENDING before a run.
//! - [`dot`] renders the graph for visualization.

pub mod build;
pub mod dot;
pub mod edge;
pub mod node;
pub mod restart;
pub mod scatter;
pub mod validate;

pub use build::Graph;
pub use edge::{Edge, EdgeId, FunctionEdge, MappingEdge, Status};
pub use node::{FileSet, NodeId};
pub use restart::apply_restart_analysis;
pub use scatter::expand_scatter;
pub use validate::validate;
