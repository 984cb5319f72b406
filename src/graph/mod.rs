//! Dependency graph model and resolution.
//!
//! A resolution produces one [`DepsGraph`]: an arena of [`Node`]s connected
//! by `Requires` and `Build` edges. It is built in stages, each extending the
//! same graph:
//!
//! 1. [`builder::GraphBuilder`] resolves the root's regular requirements
//! 2. [`expander::BuildRequiresExpander`] adds build requirements round by round,
//!    asking the [`binary::BinaryAnalyzer`] which nodes need building
//! 3. [`closure::order_closures`] fixes a deterministic order for every
//!    node's public closure
//!
//! [`manager::GraphManager`] runs the stages and reconciles the result with
//! a [`GraphLock`](crate::lockfile::GraphLock).
//!
//! # Levels
//!
//! [`DepsGraph::by_levels`] groups nodes so each level only depends on earlier
//! levels (level 0 has no dependencies). [`DepsGraph::inverse_levels`] peels
//! from the other side: level 0 holds the nodes nobody depends on, the root.

pub mod binary;
pub mod build_mode;
pub mod builder;
pub mod closure;
pub mod events;
pub mod expander;
pub mod manager;
pub mod node;

pub use binary::{BinaryAnalyzer, PackageIdAnalyzer, PackageIdMode};
pub use build_mode::BuildMode;
pub use builder::GraphBuilder;
pub use closure::order_closures;
pub use events::{ResolutionEvent, ResolutionReport};
pub use expander::BuildRequiresExpander;
pub use manager::{GraphManager, GraphRequest, Resolution, RootTarget};
pub use node::{
    BinaryStatus, Edge, EdgeKind, EvalContext, Node, NodeId, PackageId, RecipeKind,
};

use anyhow::Result;
use indexmap::IndexSet;
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};
use std::ops::{Index, IndexMut};

use crate::core::CpkgError;

/// Ordered set of node indices: the part of a graph added by one extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subgraph {
    nodes: IndexSet<NodeIndex>,
}

impl Subgraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NodeIndex) {
        self.nodes.insert(node);
    }

    #[must_use]
    pub fn contains(&self, node: NodeIndex) -> bool {
        self.nodes.contains(&node)
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<NodeIndex> for Subgraph {
    fn from_iter<I: IntoIterator<Item = NodeIndex>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

/// The dependency graph of one resolution.
#[derive(Debug, Clone, Default)]
pub struct DepsGraph {
    graph: DiGraph<Node, Edge>,
    lookup: HashMap<(String, EvalContext), NodeIndex>,
    root: Option<NodeIndex>,
    next_id: u32,
}

impl DepsGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next free node id.
    ///
    /// # Errors
    ///
    /// When every id up to `u32::MAX` is taken.
    pub fn allocate_id(&mut self) -> Result<NodeId> {
        let id = NodeId(self.next_id);
        self.next_id = self.next_id.checked_add(1).ok_or_else(|| CpkgError::Other {
            message: format!("Node id {id} is the last one available"),
        })?;
        Ok(id)
    }

    /// Make sure freshly allocated ids never collide with `id`.
    pub fn reserve_id(&mut self, id: NodeId) {
        self.next_id = self.next_id.max(id.0.saturating_add(1));
    }

    /// Add the root node. Its id is reserved.
    pub fn add_root(&mut self, node: Node) -> NodeIndex {
        let index = self.add_node(node);
        self.root = Some(index);
        index
    }

    /// Add a node, registering it for lookup by `(name, context)` when it
    /// has a reference.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        self.reserve_id(node.id);
        let key = node.reference.as_ref().map(|r| (r.name.clone(), node.context));
        let index = self.graph.add_node(node);
        if let Some(key) = key {
            self.lookup.insert(key, index);
        }
        index
    }

    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: Edge) -> EdgeIndex {
        self.graph.add_edge(from, to, edge)
    }

    /// Node already resolved for `name` in `context`.
    #[must_use]
    pub fn find(&self, name: &str, context: EvalContext) -> Option<NodeIndex> {
        self.lookup.get(&(name.to_string(), context)).copied()
    }

    #[must_use]
    pub fn root(&self) -> Option<NodeIndex> {
        self.root
    }

    #[must_use]
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.graph[index]
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.graph[index]
    }

    #[must_use]
    pub fn node_by_id(&self, id: NodeId) -> Option<NodeIndex> {
        self.graph.node_indices().find(|&index| self.graph[index].id == id)
    }

    /// All node indices in insertion order.
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Whether `to` is reachable from `from`.
    #[must_use]
    pub fn reaches(&self, from: NodeIndex, to: NodeIndex) -> bool {
        petgraph::algo::has_path_connecting(&self.graph, from, to, None)
    }

    /// Outgoing edges in the order they were added.
    pub fn dependencies(&self, index: NodeIndex) -> Vec<(Edge, NodeIndex)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .map(|e| (e.id(), *e.weight(), e.target()))
            .collect();
        edges.sort_by_key(|(id, ..)| *id);
        edges.into_iter().map(|(_, edge, target)| (edge, target)).collect()
    }

    /// Direct dependencies through any edge kind, in declaration order.
    pub fn neighbors(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.dependencies(index).into_iter().map(|(_, target)| target).collect()
    }

    /// Direct regular requirements, in declaration order.
    pub fn requires_of(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.dependencies_of_kind(index, EdgeKind::Requires)
    }

    /// Direct build requirements, in declaration order.
    pub fn build_requires_of(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.dependencies_of_kind(index, EdgeKind::Build)
    }

    fn dependencies_of_kind(&self, index: NodeIndex, kind: EdgeKind) -> Vec<NodeIndex> {
        self.dependencies(index)
            .into_iter()
            .filter(|(edge, _)| edge.kind == kind)
            .map(|(_, target)| target)
            .collect()
    }

    /// Nodes with an edge into `index`, in insertion order.
    pub fn dependents(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut sources: Vec<NodeIndex> =
            self.graph.neighbors_directed(index, Direction::Incoming).collect();
        sources.sort();
        sources.dedup();
        sources
    }

    /// Levels computed with dependencies first: level 0 has no dependencies.
    pub fn by_levels(&self) -> Vec<Vec<NodeIndex>> {
        self.levels(Direction::Outgoing)
    }

    /// Levels computed from the dependents side: level 0 has no dependents.
    pub fn inverse_levels(&self) -> Vec<Vec<NodeIndex>> {
        self.levels(Direction::Incoming)
    }

    /// Nodes of `subgraph` (or of the whole graph) with every dependency
    /// before its dependents.
    pub fn ordered_iterate(&self, subgraph: Option<&Subgraph>) -> Vec<NodeIndex> {
        self.by_levels()
            .into_iter()
            .flatten()
            .filter(|index| subgraph.is_none_or(|s| s.contains(*index)))
            .collect()
    }

    fn levels(&self, blocking: Direction) -> Vec<Vec<NodeIndex>> {
        let mut open: HashSet<NodeIndex> = self.graph.node_indices().collect();
        let mut result = Vec::new();
        while !open.is_empty() {
            let mut level: Vec<NodeIndex> = open
                .iter()
                .copied()
                .filter(|&index| {
                    !self.graph.neighbors_directed(index, blocking).any(|n| open.contains(&n))
                })
                .collect();
            if level.is_empty() {
                // Only reachable with a cycle, which the builder rejects.
                level = open.iter().copied().collect();
            }
            level.sort_by(|a, b| {
                let (a, b) = (&self.graph[*a], &self.graph[*b]);
                a.display_name().cmp(&b.display_name()).then(a.id.cmp(&b.id))
            });
            for index in &level {
                open.remove(index);
            }
            result.push(level);
        }
        result
    }
}

impl Index<NodeIndex> for DepsGraph {
    type Output = Node;

    fn index(&self, index: NodeIndex) -> &Node {
        &self.graph[index]
    }
}

impl IndexMut<NodeIndex> for DepsGraph {
    fn index_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.graph[index]
    }
}
