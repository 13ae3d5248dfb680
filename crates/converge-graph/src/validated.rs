//! Validated graphs
//!
//! A [`ValidatedGraph`] can only be produced by
//! [`DependencyGraph::into_validated`], so holding one proves the graph was
//! fully ordered. Leaves handed to a scheduler come from here.

use crate::graph::{DependencyGraph, Vertex};
use std::collections::BTreeSet;

/// Acyclic, immutable dependency graph with its build order
#[derive(Debug, Clone)]
pub struct ValidatedGraph<N> {
    graph: DependencyGraph<N>,
    order: Vec<N>,
}

impl<N: Vertex> ValidatedGraph<N> {
    pub(crate) fn new(graph: DependencyGraph<N>, order: Vec<N>) -> Self {
        Self { graph, order }
    }

    /// Underlying graph
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph<N> {
        &self.graph
    }

    /// Build order computed during validation
    #[inline]
    #[must_use]
    pub fn order(&self) -> &[N] {
        &self.order
    }

    /// Teardown order: build order reversed
    pub fn reverse_order(&self) -> impl Iterator<Item = &N> + '_ {
        self.order.iter().rev()
    }

    /// Nodes ready to run immediately
    #[must_use]
    pub fn leaves(&self) -> Vec<N> {
        self.graph.leaves()
    }

    /// Immediate dependents of a node
    #[must_use]
    pub fn required_by(&self, node: &N) -> BTreeSet<N> {
        self.graph.required_by(node)
    }

    /// Immediate prerequisites of a node
    #[must_use]
    pub fn requires(&self, node: &N) -> BTreeSet<N> {
        self.graph.requires(node)
    }

    /// Check whether a node is part of the graph
    #[inline]
    #[must_use]
    pub fn contains(&self, node: &N) -> bool {
        self.graph.contains(node)
    }

    /// Get the number of nodes
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if the graph has no nodes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Give the graph back for further construction
    #[must_use]
    pub fn into_inner(self) -> DependencyGraph<N> {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_graph_keeps_order() {
        let mut deps = DependencyGraph::new();
        deps.add_edge(1_u32, Some(2));
        deps.add_edge(2_u32, Some(3));
        deps.add_node(0_u32);

        let validated = deps.into_validated().unwrap();

        assert_eq!(validated.order(), &[0, 1, 2, 3]);
        assert_eq!(validated.reverse_order().copied().collect::<Vec<_>>(), vec![3, 2, 1, 0]);
        assert_eq!(validated.leaves(), vec![0, 1]);
        assert_eq!(validated.node_count(), 4);
        assert!(validated.contains(&3));
    }

    #[test]
    fn test_into_inner_allows_extension() {
        let mut deps = DependencyGraph::new();
        deps.add_edge(1_u32, Some(2));

        let mut graph = deps.into_validated().unwrap().into_inner();
        graph.add_edge(2, Some(1));

        assert!(graph.validate().is_err());
    }
}
