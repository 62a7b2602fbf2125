// src/graph/edge.rs

use std::fmt;

use crate::function::PipelineFunction;
use crate::graph::node::NodeId;

/// Identifier of an edge within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) usize);

impl EdgeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Runtime state of a function edge.
///
/// Transitions are monotone within a run:
/// PENDING → (RUNNING | SKIPPED) → (DONE | FAILED). Only the pre-run restart
/// analysis may move an edge back to PENDING.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "PENDING",
            Status::Running => "RUNNING",
            Status::Done => "DONE",
            Status::Failed => "FAILED",
            Status::Skipped => "SKIPPED",
        };
        f.write_str(s)
    }
}

/// A unit of work between its input-set node and output-set node.
#[derive(Debug, Clone)]
pub struct FunctionEdge {
    pub function: PipelineFunction,
    pub status: Status,
    pub(crate) source: NodeId,
    pub(crate) target: NodeId,
}

/// A synthetic edge connecting a multi-file set node to one of its element
/// nodes. Carries no work and no state.
#[derive(Debug, Clone, Copy)]
pub struct MappingEdge {
    pub(crate) source: NodeId,
    pub(crate) target: NodeId,
}

/// A directed edge of the graph.
#[derive(Debug, Clone)]
pub enum Edge {
    Function(FunctionEdge),
    Mapping(MappingEdge),
}

impl Edge {
    pub fn source(&self) -> NodeId {
        match self {
            Edge::Function(e) => e.source,
            Edge::Mapping(e) => e.source,
        }
    }

    pub fn target(&self) -> NodeId {
        match self {
            Edge::Function(e) => e.target,
            Edge::Mapping(e) => e.target,
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, Edge::Mapping(_))
    }

    pub fn as_function(&self) -> Option<&FunctionEdge> {
        match self {
            Edge::Function(e) => Some(e),
            Edge::Mapping(_) => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut FunctionEdge> {
        match self {
            Edge::Function(e) => Some(e),
            Edge::Mapping(_) => None,
        }
    }
}
