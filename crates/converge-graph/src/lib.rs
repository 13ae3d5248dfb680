//! Converge Graph
//!
//! Directed dependency graphs with a deterministic ordering and an explicit
//! cycle check. Two-phase use:
//! 1. **Construction**: add nodes and edges to a [`DependencyGraph`], translate
//!    node types, merge graphs from several sources
//! 2. **Validation**: [`DependencyGraph::into_validated`] proves the graph is
//!    acyclic and produces a [`ValidatedGraph`] whose leaves are safe to hand
//!    out
//!
//! # Example
//!
//! ```rust
//! use converge_graph::DependencyGraph;
//!
//! // "server" requires "network": the network must be done first
//! let mut deps = DependencyGraph::new();
//! deps.add_edge("network".to_string(), Some("server".to_string()));
//!
//! let validated = deps.into_validated().unwrap();
//! assert_eq!(validated.leaves(), vec!["network".to_string()]);
//! ```

pub mod error;
pub mod graph;
pub mod validated;

pub use error::CycleError;
pub use graph::{DependencyGraph, Vertex};
pub use validated::ValidatedGraph;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
