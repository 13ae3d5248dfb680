//! Testing utilities for the converge workspace
//!
//! Shared test helpers, fixtures, and assertions.

#![allow(missing_docs)]

use converge_core::{
    CheckRequest, ConvergencePass, GraphNode, MemoryStore, ResourceDefinition, Scheduler, SchedulerError,
    StackContext, Template,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Scheduler that records every request instead of running it
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    requests: Mutex<Vec<CheckRequest>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every request recorded so far
    pub fn take(&self) -> Vec<CheckRequest> {
        std::mem::take(&mut *self.requests.lock())
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }
}

impl Scheduler for RecordingScheduler {
    fn check_resource(&self, request: CheckRequest) -> Result<(), SchedulerError> {
        self.requests.lock().push(request);
        Ok(())
    }
}

/// In-memory store, recording scheduler and a context over both
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub scheduler: Arc<RecordingScheduler>,
    pub ctx: StackContext,
}

pub fn memory_context() -> TestContext {
    let store = Arc::new(MemoryStore::new());
    let scheduler = Arc::new(RecordingScheduler::new());
    let ctx = StackContext::new(store.clone(), scheduler.clone());
    TestContext { store, scheduler, ctx }
}

/// Build a template from `(name, requirements)` pairs
pub fn template(resources: &[(&str, &[&str])]) -> Template {
    try_template(resources).unwrap()
}

pub fn try_template(resources: &[(&str, &[&str])]) -> Result<Template, converge_core::TemplateError> {
    Template::new(resources.iter().map(|(name, requires)| {
        let definition = requires
            .iter()
            .fold(ResourceDefinition::new("OS::Heat::None"), |d, r| d.depends_on(*r));
        (*name, definition)
    }))
}

/// `name/build` or `name/cleanup`
pub fn label(node: &GraphNode) -> String {
    let phase = if node.forward { "build" } else { "cleanup" };
    format!("{}/{phase}", node.key.name)
}

pub fn labels(nodes: &[GraphNode]) -> Vec<String> {
    nodes.iter().map(label).collect()
}

/// Labels of the leaves a pass dispatched
pub fn dispatched(pass: &ConvergencePass) -> Vec<String> {
    labels(&pass.dispatched)
}

/// Position of `node` in the pass's topological order
pub fn position(pass: &ConvergencePass, node: &GraphNode) -> usize {
    pass.graph.order().iter().position(|n| n == node).unwrap()
}

/// Find the only node of `pass` with this name and phase
pub fn node(pass: &ConvergencePass, name: &str, forward: bool) -> GraphNode {
    let mut found = pass
        .graph
        .order()
        .iter()
        .filter(|n| n.key.name == name && n.forward == forward);
    let node = found.next().cloned().unwrap();
    assert!(found.next().is_none(), "more than one {name} node");
    node
}
