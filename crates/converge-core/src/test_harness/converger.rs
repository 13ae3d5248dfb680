//! Simulated converger
//!
//! Consumes check requests from a [`CheckQueue`], applies them to a
//! [`Provisioner`] and walks each pass's graph, dispatching dependents once
//! all of their prerequisites are done. When every node of a graph has been
//! checked the stack is told the pass is complete.

use super::reality::Provisioner;
use crate::config::ConvergeConfig;
use crate::error::{SimulationError, StoreError};
use crate::resource::Resource;
use crate::scheduler::{CheckQueue, CheckRequest};
use crate::stack::{Stack, StackContext};
use crate::template::Template;
use crate::types::{generation_label, ConvergenceGraph, GraphNode};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Completed and dispatched nodes of one pass
#[derive(Debug)]
struct PassProgress {
    graph: Arc<ConvergenceGraph>,
    state: Mutex<ProgressState>,
}

#[derive(Debug, Default)]
struct ProgressState {
    completed: BTreeSet<GraphNode>,
    dispatched: BTreeSet<GraphNode>,
}

impl PassProgress {
    fn new(graph: Arc<ConvergenceGraph>) -> Self {
        Self {
            graph,
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// Record `node` as done; returns the dependents that just became ready
    /// and whether the whole graph is now complete
    fn complete(&self, node: &GraphNode) -> (Vec<GraphNode>, bool) {
        let mut state = self.state.lock();
        state.completed.insert(node.clone());
        state.dispatched.insert(node.clone());

        let mut ready = Vec::new();
        for dependent in self.graph.required_by(node) {
            let prerequisites_done = self
                .graph
                .requires(&dependent)
                .iter()
                .all(|n| state.completed.contains(n));
            if prerequisites_done && state.dispatched.insert(dependent.clone()) {
                ready.push(dependent);
            }
        }

        (ready, state.completed.len() == self.graph.node_count())
    }
}

/// Progress of every pass in flight, keyed by graph identity
type ProgressMap = DashMap<usize, Arc<PassProgress>>;

/// Shared state of the check tasks
#[derive(Clone)]
struct Worker {
    ctx: StackContext,
    provisioner: Arc<dyn Provisioner>,
    progress: Arc<ProgressMap>,
    limiter: Arc<Semaphore>,
}

/// Runs checks handed over by a channel scheduler
pub struct SimulatedConverger {
    queue: CheckQueue,
    worker: Worker,
}

impl SimulatedConverger {
    /// Create converger over the queue of the scheduler in `ctx`
    #[must_use]
    pub fn new(
        ctx: StackContext,
        queue: CheckQueue,
        provisioner: Arc<dyn Provisioner>,
        config: &ConvergeConfig,
    ) -> Self {
        Self {
            queue,
            worker: Worker {
                ctx,
                provisioner,
                progress: Arc::new(DashMap::new()),
                limiter: Arc::new(Semaphore::new(config.max_concurrent_checks.max(1))),
            },
        }
    }

    /// Number of passes with checks still outstanding
    #[must_use]
    pub fn passes_in_flight(&self) -> usize {
        self.worker.progress.len()
    }

    /// Run checks until nothing is queued or in flight
    ///
    /// Returns the number of checks processed. The first failing check
    /// aborts the run; checks still in flight are cancelled.
    pub async fn run_until_idle(&mut self) -> Result<usize, SimulationError> {
        let mut tasks = JoinSet::new();
        let mut processed = 0;

        loop {
            while let Some(request) = self.queue.try_recv() {
                tasks.spawn(self.worker.clone().check(request));
            }

            match tasks.join_next().await {
                Some(joined) => {
                    joined??;
                    processed += 1;
                }
                None => break,
            }
        }

        tracing::debug!("Converger idle after {processed} checks");
        Ok(processed)
    }
}

impl Worker {
    async fn check(self, request: CheckRequest) -> Result<(), SimulationError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| SimulationError::QueueClosed)?;

        let stack = Stack::load(self.ctx.clone(), request.stack_key)?;
        let node = request.node();
        let graph_id = Arc::as_ptr(&request.graph) as usize;
        if stack.current_template_key() != request.generation {
            tracing::debug!(
                "Dropping check of {node}: template {} is no longer current",
                generation_label(request.generation)
            );
            // The superseded pass can never finish
            self.progress.remove(&graph_id);
            return Ok(());
        }

        if request.forward {
            self.converge_resource(&request).await?;
        } else {
            self.cleanup_resource(&request).await?;
        }

        let progress = self
            .progress
            .entry(graph_id)
            .or_insert_with(|| Arc::new(PassProgress::new(Arc::clone(&request.graph))))
            .clone();

        let (ready, finished) = progress.complete(&node);
        for next in ready {
            tracing::trace!("{node} done, dispatching {next}");
            self.ctx.scheduler.check_resource(request.for_node(&next))?;
        }

        if finished {
            self.progress.remove(&graph_id);
            let mut stack = Stack::load(self.ctx.clone(), request.stack_key)?;
            stack.mark_complete(request.generation)?;
        }

        Ok(())
    }

    async fn converge_resource(&self, request: &CheckRequest) -> Result<(), SimulationError> {
        let store = self.ctx.store.as_ref();
        let mut resource = Resource::load(store, request.graph_key.key)?;

        if let Some(generation) = request.generation {
            let template = Template::load(store, generation)?;
            let definition = template
                .definition(&resource.name)
                .cloned()
                .ok_or_else(|| StoreError::NameNotFound {
                    kind: "resource definition",
                    name: resource.name.clone(),
                })?;

            resource.template_key = generation;
            resource.requirements.clone_from(&definition.requires);
            self.provisioner.provision(&resource, &definition).await?;
            resource.definition = definition;
            resource.store(store)?;
        }

        tracing::info!("Converged {}", request.graph_key);
        Ok(())
    }

    async fn cleanup_resource(&self, request: &CheckRequest) -> Result<(), SimulationError> {
        let store = self.ctx.store.as_ref();

        match Resource::load(store, request.graph_key.key) {
            Ok(resource) => {
                self.provisioner.teardown(&resource).await?;
                resource.delete(store)?;
                tracing::info!("Cleaned up {}", request.graph_key);
            }
            Err(StoreError::NotFound { .. }) => {
                tracing::debug!("{} already gone", request.graph_key);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GraphKey, ResourceKey};
    use converge_graph::DependencyGraph;

    fn build(name: &str, key: u64) -> GraphNode {
        GraphNode::build(GraphKey::new(name, ResourceKey(key)))
    }

    #[test]
    fn dependent_is_ready_only_after_all_prerequisites() {
        // a -> c <- b, c -> d
        let mut graph = DependencyGraph::new();
        graph.add_edge(build("a", 1), build("c", 3));
        graph.add_edge(build("b", 2), build("c", 3));
        graph.add_edge(build("c", 3), build("d", 4));
        let progress = PassProgress::new(Arc::new(graph.into_validated().unwrap()));

        assert_eq!(progress.complete(&build("a", 1)), (vec![], false));
        assert_eq!(progress.complete(&build("b", 2)), (vec![build("c", 3)], false));
        assert_eq!(progress.complete(&build("c", 3)), (vec![build("d", 4)], false));
        assert_eq!(progress.complete(&build("d", 4)), (vec![], true));
    }

    #[test]
    fn ready_nodes_are_dispatched_once() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(build("a", 1), build("b", 2));
        let progress = PassProgress::new(Arc::new(graph.into_validated().unwrap()));

        assert_eq!(progress.complete(&build("a", 1)).0, vec![build("b", 2)]);
        assert!(progress.complete(&build("a", 1)).0.is_empty());
    }
}
