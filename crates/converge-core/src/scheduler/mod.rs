//! Scheduler seam
//!
//! The orchestrator hands every leaf of a validated convergence graph to a
//! [`Scheduler`]. Whatever runs the checks later walks the same graph to
//! decide which dependents become ready.

mod channel;

pub use channel::{ChannelScheduler, CheckQueue};

use crate::error::SchedulerError;
use crate::types::{ConvergenceGraph, Generation, GraphKey, GraphNode, StackKey};
use std::sync::Arc;

/// Request to check (build or clean up) one resource instance
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Stack the pass belongs to
    pub stack_key: StackKey,
    /// Instance to check
    pub graph_key: GraphKey,
    /// Target generation of the pass
    pub generation: Generation,
    /// Initial data passed along the graph
    pub payload: serde_json::Map<String, serde_json::Value>,
    /// The whole validated graph of the pass
    pub graph: Arc<ConvergenceGraph>,
    /// Build (`true`) or cleanup (`false`)
    pub forward: bool,
}

impl CheckRequest {
    /// Graph node this request checks
    #[must_use]
    pub fn node(&self) -> GraphNode {
        GraphNode {
            key: self.graph_key.clone(),
            forward: self.forward,
        }
    }

    /// Request for another node of the same pass
    #[must_use]
    pub fn for_node(&self, node: &GraphNode) -> Self {
        Self {
            graph_key: node.key.clone(),
            forward: node.forward,
            payload: serde_json::Map::new(),
            ..self.clone()
        }
    }
}

/// Accepts ready nodes for asynchronous checking
pub trait Scheduler: Send + Sync {
    /// Hand one ready node over; must not block on the check itself
    fn check_resource(&self, request: CheckRequest) -> Result<(), SchedulerError>;
}
