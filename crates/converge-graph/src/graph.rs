//! Dependency graph construction and ordering
//!
//! Edges point from a prerequisite to its dependent: `add_edge(a, b)` means
//! `b` cannot proceed until `a` is done. Leaves are therefore the nodes with
//! no incoming edge.

use crate::error::CycleError;
use crate::validated::ValidatedGraph;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;
use std::ops::AddAssign;

/// Requirements on the node type of a [`DependencyGraph`]
///
/// `Ord` provides the tie-break between nodes that are ready at the same
/// time, which keeps every ordering deterministic.
pub trait Vertex: Clone + Ord + Hash + fmt::Display {}

impl<T: Clone + Ord + Hash + fmt::Display> Vertex for T {}

/// Directed dependency graph
#[derive(Debug, Clone)]
pub struct DependencyGraph<N> {
    graph: DiGraph<N, ()>,
    index: HashMap<N, NodeIndex>,
}

impl<N: Vertex> DependencyGraph<N> {
    /// Create a new empty graph
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    fn ensure_node(&mut self, node: N) -> NodeIndex {
        if let Some(&index) = self.index.get(&node) {
            index
        } else {
            let index = self.graph.add_node(node.clone());
            self.index.insert(node, index);
            index
        }
    }

    /// Declare a node present without any dependency
    pub fn add_node(&mut self, node: N) {
        self.ensure_node(node);
    }

    /// Add an edge: `to` depends on `from`
    ///
    /// Passing `None` for `to` only declares `from` present. Adding an edge
    /// that already exists is a no-op.
    pub fn add_edge(&mut self, from: N, to: impl Into<Option<N>>) {
        let from_idx = self.ensure_node(from);

        if let Some(to) = to.into() {
            let to_idx = self.ensure_node(to);
            if !self.graph.contains_edge(from_idx, to_idx) {
                self.graph.add_edge(from_idx, to_idx, ());
            }
        }
    }

    /// Check whether a node appears anywhere in the graph
    #[inline]
    #[must_use]
    pub fn contains(&self, node: &N) -> bool {
        self.index.contains_key(node)
    }

    /// Immediate dependents of a node
    #[must_use]
    pub fn required_by(&self, node: &N) -> BTreeSet<N> {
        self.neighbors(node, Direction::Outgoing)
    }

    /// Immediate prerequisites of a node
    #[must_use]
    pub fn requires(&self, node: &N) -> BTreeSet<N> {
        self.neighbors(node, Direction::Incoming)
    }

    fn neighbors(&self, node: &N, direction: Direction) -> BTreeSet<N> {
        self.index
            .get(node)
            .map(|&idx| {
                self.graph
                    .neighbors_directed(idx, direction)
                    .map(|n| self.graph[n].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nodes with no incoming edge, sorted
    #[must_use]
    pub fn leaves(&self) -> Vec<N> {
        let mut leaves: Vec<N> = self
            .graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| self.graph[idx].clone())
            .collect();
        leaves.sort();
        leaves
    }

    /// All nodes, sorted
    #[must_use]
    pub fn nodes(&self) -> Vec<N> {
        let mut nodes: Vec<N> = self.graph.node_weights().cloned().collect();
        nodes.sort();
        nodes
    }

    /// All edges as `(prerequisite, dependent)` pairs, sorted
    #[must_use]
    pub fn edges(&self) -> Vec<(N, N)> {
        let mut edges: Vec<(N, N)> = self
            .graph
            .raw_edges()
            .iter()
            .map(|e| (self.graph[e.source()].clone(), self.graph[e.target()].clone()))
            .collect();
        edges.sort();
        edges
    }

    /// Get the number of nodes
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if the graph has no nodes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Map every node through `f`, keeping every edge
    ///
    /// Nodes that map to the same value collapse into one.
    #[must_use]
    pub fn translate<M, F>(&self, mut f: F) -> DependencyGraph<M>
    where
        M: Vertex,
        F: FnMut(&N) -> M,
    {
        match self.try_translate(|node| Ok::<M, Infallible>(f(node))) {
            Ok(graph) => graph,
            Err(never) => match never {},
        }
    }

    /// Fallible [`translate`](Self::translate); stops at the first error
    pub fn try_translate<M, E, F>(&self, mut f: F) -> Result<DependencyGraph<M>, E>
    where
        M: Vertex,
        F: FnMut(&N) -> Result<M, E>,
    {
        let mut translated = DependencyGraph::new();

        // Node indices of a DiGraph are contiguous, so position == index
        let mut mapped = Vec::with_capacity(self.graph.node_count());
        for idx in self.graph.node_indices() {
            let node = f(&self.graph[idx])?;
            translated.add_node(node.clone());
            mapped.push(node);
        }

        for edge in self.graph.raw_edges() {
            translated.add_edge(
                mapped[edge.source().index()].clone(),
                mapped[edge.target().index()].clone(),
            );
        }

        Ok(translated)
    }

    /// Union another graph's nodes and edges into this one
    pub fn merge(&mut self, other: &DependencyGraph<N>) {
        for node in other.graph.node_weights() {
            self.add_node(node.clone());
        }
        for edge in other.graph.raw_edges() {
            self.add_edge(
                other.graph[edge.source()].clone(),
                other.graph[edge.target()].clone(),
            );
        }
    }

    /// Every node in build order: prerequisites before dependents
    ///
    /// Kahn's algorithm; among nodes that are ready together the smallest
    /// (by `Ord`) comes first.
    pub fn topological_order(&self) -> Result<Vec<N>, CycleError> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: BTreeMap<N, NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .map(|idx| (self.graph[idx].clone(), idx))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some((node, idx)) = ready.pop_first() {
            for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let degree = &mut in_degree[dependent.index()];
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(self.graph[dependent].clone(), dependent);
                }
            }
            order.push(node);
        }

        if order.len() < self.graph.node_count() {
            return Err(self.cycle_error());
        }

        Ok(order)
    }

    /// Every node in teardown order: the exact reverse of the build order
    pub fn reverse_topological_order(&self) -> Result<Vec<N>, CycleError> {
        let mut order = self.topological_order()?;
        order.reverse();
        Ok(order)
    }

    /// Check that the graph can be fully ordered
    pub fn validate(&self) -> Result<(), CycleError> {
        self.topological_order().map(|_| ())
    }

    /// Prove the graph acyclic and freeze it
    pub fn into_validated(self) -> Result<ValidatedGraph<N>, CycleError> {
        let order = self.topological_order()?;
        Ok(ValidatedGraph::new(self, order))
    }

    fn cycle_error(&self) -> CycleError {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&idx| self.graph.contains_edge(idx, idx))
            })
            .map(|component| {
                let mut members: Vec<&N> = component.iter().map(|&idx| &self.graph[idx]).collect();
                members.sort();
                members.into_iter().map(ToString::to_string).collect()
            })
            .collect();
        cycles.sort();
        CycleError::new(cycles)
    }
}

impl<N: Vertex> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Vertex> AddAssign for DependencyGraph<N> {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}

impl<N: Vertex> fmt::Display for DependencyGraph<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "(empty)");
        }

        for (i, node) in self.nodes().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let requires: Vec<String> = self.requires(node).iter().map(ToString::to_string).collect();
            write!(f, "{node} <- {{{}}}", requires.join(", "))?;
        }
        Ok(())
    }
}
