// src/graph/build.rs

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::function::PipelineFunction;
use crate::graph::edge::{Edge, EdgeId, FunctionEdge, MappingEdge, Status};
use crate::graph::node::{FileSet, NodeId};

/// The mutable dependency graph: interned file-set nodes, function edges and
/// mapping edges, with adjacency kept per node.
///
/// Removed edges leave tombstones in the arena so `EdgeId`s stay stable
/// across pruning and scatter rewriting; all iteration helpers skip them.
pub struct Graph {
    run_dir: PathBuf,
    nodes: Vec<FileSet>,
    ids: HashMap<FileSet, NodeId>,
    edges: Vec<Option<Edge>>,
    outgoing: Vec<Vec<EdgeId>>,
    incoming: Vec<Vec<EdgeId>>,
    next_order: u32,
}

impl Graph {
    pub fn new() -> Self {
        Self::with_run_dir(PathBuf::from("."))
    }

    /// A graph whose functions resolve default log-file paths under `run_dir`
    /// when frozen.
    pub fn with_run_dir(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
            nodes: Vec::new(),
            ids: HashMap::new(),
            edges: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            next_order: 0,
        }
    }

    /// Look up or create the node for a file set.
    pub fn intern(&mut self, set: FileSet) -> NodeId {
        if let Some(&id) = self.ids.get(&set) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(set.clone());
        self.ids.insert(set, id);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        id
    }

    pub fn node(&self, id: NodeId) -> &FileSet {
        &self.nodes[id.0]
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0).and_then(|slot| slot.as_ref())
    }

    pub fn function_edge(&self, id: EdgeId) -> Option<&FunctionEdge> {
        self.edge(id).and_then(Edge::as_function)
    }

    pub fn function_edge_mut(&mut self, id: EdgeId) -> Option<&mut FunctionEdge> {
        self.edges
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .and_then(Edge::as_function_mut)
    }

    /// Freeze a function and insert its edge.
    ///
    /// The input-set and output-set nodes are looked up or created by
    /// file-set equality; any pre-existing *mapping* edges between the two
    /// nodes are removed (the new direct edge makes them redundant).
    /// Functions without an `add_order` receive the next declaration index.
    pub fn add(&mut self, mut function: PipelineFunction) -> Result<EdgeId> {
        if function.add_order().is_empty() {
            function.set_add_order(vec![self.next_order]);
            self.next_order += 1;
        }

        let name = function.name().to_string();
        function
            .freeze(&self.run_dir)
            .with_context(|| format!("adding function '{}' to the graph", name))?;

        let source = self.intern(FileSet::from(function.inputs()));
        let target = self.intern(FileSet::from(function.outputs()));

        self.remove_mappings_between(source, target);
        self.remove_mappings_between(target, source);

        debug!(function = %name, "inserting function edge");
        Ok(self.insert_edge(Edge::Function(FunctionEdge {
            function,
            status: Status::Pending,
            source,
            target,
        })))
    }

    /// Add a mapping edge unless any edge already runs `from → to`.
    pub fn add_mapping(&mut self, from: NodeId, to: NodeId) {
        let exists = self.outgoing[from.0]
            .iter()
            .any(|&e| self.edge(e).is_some_and(|edge| edge.target() == to));
        if !exists {
            self.insert_edge(Edge::Mapping(MappingEdge { source: from, target: to }));
        }
    }

    /// Expose indirect dependencies between file sets and their elements.
    ///
    /// For every function edge: an output set of cardinality > 1 gets a
    /// mapping edge from the set node to each element node; an input set of
    /// cardinality > 1 gets a mapping edge from each element node to the set
    /// node. If function A produces `{x,y}` and function B reads `{x}`, the
    /// chain A → {x,y} → {x} → B is what the scheduler traverses.
    pub fn fill_in(&mut self) {
        let mut set_to_element: Vec<(NodeId, FileSet)> = Vec::new();
        let mut element_to_set: Vec<(FileSet, NodeId)> = Vec::new();

        for slot in self.edges.iter() {
            let Some(Edge::Function(fe)) = slot else { continue };
            if self.nodes[fe.target.0].len() > 1 {
                for file in self.nodes[fe.target.0].iter() {
                    set_to_element.push((fe.target, FileSet::singleton(file.clone())));
                }
            }
            if self.nodes[fe.source.0].len() > 1 {
                for file in self.nodes[fe.source.0].iter() {
                    element_to_set.push((FileSet::singleton(file.clone()), fe.source));
                }
            }
        }

        for (set_node, element) in set_to_element {
            let element_node = self.intern(element);
            self.add_mapping(set_node, element_node);
        }
        for (element, set_node) in element_to_set {
            let element_node = self.intern(element);
            self.add_mapping(element_node, set_node);
        }
    }

    /// Remove filler mapping edges until fixpoint.
    ///
    /// A mapping edge is filler when its target has no consumer (no outgoing
    /// edges) or its source has no producer (no incoming edges). Nodes left
    /// with degree 0 drop out of all iteration helpers.
    pub fn prune(&mut self) {
        loop {
            let filler: Vec<EdgeId> = self
                .edge_ids()
                .into_iter()
                .filter(|&id| {
                    let Some(edge) = self.edge(id) else { return false };
                    if !edge.is_mapping() {
                        return false;
                    }
                    !self.has_live_outgoing(edge.target()) || !self.has_live_incoming(edge.source())
                })
                .collect();

            if filler.is_empty() {
                break;
            }
            for id in filler {
                debug!(edge = id.0, "pruning filler mapping edge");
                self.remove_edge(id);
            }
        }
    }

    /// Remove an edge, detaching it from both adjacency lists.
    pub fn remove_edge(&mut self, id: EdgeId) {
        let Some(edge) = self.edges[id.0].take() else { return };
        self.outgoing[edge.source().0].retain(|&e| e != id);
        self.incoming[edge.target().0].retain(|&e| e != id);
    }

    /// All live edge ids.
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| EdgeId(i))
            .collect()
    }

    /// Live function edge ids, ordered by `add_order`.
    pub fn function_edge_ids(&self) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = self
            .edges
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Some(Edge::Function(_))))
            .map(|(i, _)| EdgeId(i))
            .collect();
        ids.sort_by(|a, b| {
            let fa = self.function_edge(*a).expect("live function edge");
            let fb = self.function_edge(*b).expect("live function edge");
            fa.function.add_order().cmp(fb.function.add_order())
        });
        ids
    }

    /// Nodes that still participate in the graph (degree > 0).
    pub fn live_node_ids(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|&n| self.has_live_outgoing(n) || self.has_live_incoming(n))
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.live_node_ids().len()
    }

    pub fn outgoing_edges(&self, node: NodeId) -> Vec<EdgeId> {
        self.outgoing[node.0]
            .iter()
            .copied()
            .filter(|&e| self.edge(e).is_some())
            .collect()
    }

    pub fn incoming_edges(&self, node: NodeId) -> Vec<EdgeId> {
        self.incoming[node.0]
            .iter()
            .copied()
            .filter(|&e| self.edge(e).is_some())
            .collect()
    }

    fn has_live_outgoing(&self, node: NodeId) -> bool {
        self.outgoing[node.0].iter().any(|&e| self.edge(e).is_some())
    }

    fn has_live_incoming(&self, node: NodeId) -> bool {
        self.incoming[node.0].iter().any(|&e| self.edge(e).is_some())
    }

    /// The function edges feeding an edge's source node.
    ///
    /// Walks incoming edges, recursing through mapping edges and stopping at
    /// function edges.
    pub fn previous_functions(&self, id: EdgeId) -> Vec<EdgeId> {
        let Some(edge) = self.edge(id) else { return Vec::new() };

        let mut found: BTreeSet<EdgeId> = BTreeSet::new();
        let mut stack = vec![edge.source()];
        let mut visited: HashSet<NodeId> = HashSet::new();

        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            for incoming in self.incoming_edges(node) {
                match self.edge(incoming) {
                    Some(Edge::Function(_)) => {
                        found.insert(incoming);
                    }
                    Some(Edge::Mapping(m)) => stack.push(m.source),
                    None => {}
                }
            }
        }

        found.into_iter().collect()
    }

    /// Function edges in dependency order: by longest-path depth of their
    /// source node, ties broken by `add_order`.
    ///
    /// Fails if the graph contains a cycle.
    pub fn topo_function_edges(&self) -> Result<Vec<EdgeId>> {
        let live = self.live_node_ids();
        let mut in_degree: HashMap<NodeId, usize> = live
            .iter()
            .map(|&n| (n, self.incoming_edges(n).len()))
            .collect();
        let mut depth: HashMap<NodeId, usize> = live.iter().map(|&n| (n, 0)).collect();

        let mut queue: VecDeque<NodeId> = live
            .iter()
            .copied()
            .filter(|n| in_degree[n] == 0)
            .collect();
        let mut processed = 0usize;

        while let Some(node) = queue.pop_front() {
            processed += 1;
            let node_depth = depth[&node];
            for out in self.outgoing_edges(node) {
                let target = self.edge(out).expect("live edge").target();
                let entry = depth.get_mut(&target).expect("live node");
                *entry = (*entry).max(node_depth + 1);
                let deg = in_degree.get_mut(&target).expect("live node");
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(target);
                }
            }
        }

        if processed != live.len() {
            anyhow::bail!("cycles were detected in the graph");
        }

        let mut ids = self.function_edge_ids();
        ids.sort_by_key(|&id| {
            let fe = self.function_edge(id).expect("live function edge");
            (depth[&fe.source], fe.function.add_order().to_vec())
        });
        Ok(ids)
    }

    fn remove_mappings_between(&mut self, from: NodeId, to: NodeId) {
        let redundant: Vec<EdgeId> = self.outgoing[from.0]
            .iter()
            .copied()
            .filter(|&e| {
                self.edge(e)
                    .is_some_and(|edge| edge.is_mapping() && edge.target() == to)
            })
            .collect();
        for id in redundant {
            debug!(edge = id.0, "removing mapping edge made redundant by a function edge");
            self.remove_edge(id);
        }
    }

    fn insert_edge(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId(self.edges.len());
        let (source, target) = (edge.source(), edge.target());
        self.edges.push(Some(edge));
        self.outgoing[source.0].push(id);
        self.incoming[target.0].push(id);
        id
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
