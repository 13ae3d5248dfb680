//! Stack orchestrator
//!
//! A [`Stack`] owns the generation lineage of one deployed topology. Every
//! lifecycle operation runs a *convergence pass*: existing instances are
//! matched against the target template, a merged graph of build and cleanup
//! nodes is built and validated, and its leaves are handed to the scheduler.
//! Completion of a pass is reported back through [`Stack::mark_complete`].

use crate::error::{ConvergeError, StoreError};
use crate::matcher::ResourceMatcher;
use crate::resource::Resource;
use crate::scheduler::{CheckRequest, Scheduler};
use crate::store::{Record, Storage};
use crate::template::Template;
use crate::types::{
    generation_label, ConvergenceGraph, ConvergenceGraphBuilder, Generation, GraphKey, GraphNode, ResourceKey,
    StackKey,
};
use converge_graph::DependencyGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Stored form of a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRecord {
    /// Stack name; not required to be unique
    pub name: String,
    /// Current generation
    pub template_key: Generation,
    /// Last generation known to be fully converged
    pub prev_template_key: Generation,
}

impl Record for StackRecord {
    type Key = StackKey;
    const KIND: &'static str = "stack";
}

/// Collaborators a stack works with
#[derive(Clone)]
pub struct StackContext {
    /// Persistent rows
    pub store: Arc<dyn Storage>,
    /// Receives ready nodes
    pub scheduler: Arc<dyn Scheduler>,
}

impl StackContext {
    /// Create context
    #[must_use]
    pub fn new(store: Arc<dyn Storage>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { store, scheduler }
    }
}

impl fmt::Debug for StackContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackContext").finish_non_exhaustive()
    }
}

/// Outcome of starting one convergence pass
#[derive(Debug, Clone)]
pub struct ConvergencePass {
    /// Stack the pass runs for
    pub stack_key: StackKey,
    /// Generation converged away from
    pub from: Generation,
    /// Generation converged to
    pub target: Generation,
    /// Validated merged graph
    pub graph: Arc<ConvergenceGraph>,
    /// Leaves handed to the scheduler, in order
    pub dispatched: Vec<GraphNode>,
}

impl ConvergencePass {
    /// Nodes of the build subgraph
    #[must_use]
    pub fn build_nodes(&self) -> Vec<GraphNode> {
        self.graph.order().iter().filter(|n| n.forward).cloned().collect()
    }

    /// Nodes of the cleanup subgraph
    #[must_use]
    pub fn cleanup_nodes(&self) -> Vec<GraphNode> {
        self.graph.order().iter().filter(|n| !n.forward).cloned().collect()
    }
}

/// A deployed topology and its generation lineage
#[derive(Debug)]
pub struct Stack {
    ctx: StackContext,
    key: Option<StackKey>,
    name: String,
    template: Template,
    prev_template_key: Generation,
}

impl Stack {
    /// Create an unsaved stack
    #[must_use]
    pub fn new(ctx: StackContext, name: impl Into<String>, template: Template) -> Self {
        Self {
            ctx,
            key: None,
            name: name.into(),
            template,
            prev_template_key: None,
        }
    }

    /// Load a stored stack with its current template
    pub fn load(ctx: StackContext, key: StackKey) -> Result<Self, ConvergeError> {
        let record = ctx.store.stacks().read(key)?;
        let template = Template::load_generation(ctx.store.as_ref(), record.template_key)?;

        Ok(Self {
            ctx,
            key: Some(key),
            name: record.name,
            template,
            prev_template_key: record.prev_template_key,
        })
    }

    /// Load the only stack with this name
    pub fn load_by_name(ctx: StackContext, name: &str) -> Result<Self, ConvergeError> {
        let keys = ctx.store.stacks().find(&|row| row.name == name)?;

        match keys.as_slice() {
            [] => Err(StoreError::NameNotFound {
                kind: StackRecord::KIND,
                name: name.to_string(),
            }
            .into()),
            [key] => Self::load(ctx, *key),
            _ => Err(ConvergeError::AmbiguousStack {
                name: name.to_string(),
                count: keys.len(),
            }),
        }
    }

    /// Create or update the stack row; returns its key
    pub fn store(&mut self) -> Result<StackKey, ConvergeError> {
        let record = self.to_record();
        match self.key {
            Some(key) => {
                self.ctx.store.stacks().update(key, record)?;
                Ok(key)
            }
            None => {
                let key = self.ctx.store.stacks().create(record)?;
                self.key = Some(key);
                Ok(key)
            }
        }
    }

    /// Stored form
    #[must_use]
    pub fn to_record(&self) -> StackRecord {
        StackRecord {
            name: self.name.clone(),
            template_key: self.template.key(),
            prev_template_key: self.prev_template_key,
        }
    }

    /// Storage key; `None` until stored
    #[inline]
    #[must_use]
    pub fn key(&self) -> Option<StackKey> {
        self.key
    }

    /// Stack name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current template
    #[inline]
    #[must_use]
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Current generation
    #[inline]
    #[must_use]
    pub fn current_template_key(&self) -> Generation {
        self.template.key()
    }

    /// Last generation known to be fully converged
    #[inline]
    #[must_use]
    pub fn previous_template_key(&self) -> Generation {
        self.prev_template_key
    }

    /// Converge from nothing to the current template
    pub fn create(&mut self) -> Result<ConvergencePass, ConvergeError> {
        self.template.store(self.ctx.store.as_ref())?;
        tracing::info!("[{}] Creating", self.label());
        self.converge(None)
    }

    /// Converge from the current template to `template`
    pub fn update(&mut self, mut template: Template) -> Result<ConvergencePass, ConvergeError> {
        template.store(self.ctx.store.as_ref())?;

        let from = self.template.key();
        tracing::info!(
            "[{}] Updating from template {} to {}",
            self.label(),
            generation_label(from),
            generation_label(template.key())
        );

        self.prev_template_key = from;
        self.template = template;
        self.converge(from)
    }

    /// Converge to the empty template, cleaning up every instance
    pub fn delete(&mut self) -> Result<ConvergencePass, ConvergeError> {
        let from = self.template.key();
        tracing::info!("[{}] Deleting", self.label());

        self.template = Template::empty();
        self.converge(from)
    }

    /// Converge back to the previous generation
    ///
    /// Returns `None` when there is nothing to roll back to. The previous
    /// generation is left in place, so issuing a second rollback before the
    /// first completes does nothing.
    pub fn rollback(&mut self) -> Result<Option<ConvergencePass>, ConvergeError> {
        let current = self.template.key();
        if self.prev_template_key == current {
            tracing::debug!("[{}] Nothing to roll back", self.label());
            return Ok(None);
        }

        tracing::info!(
            "[{}] Rolling back from template {} to {}",
            self.label(),
            generation_label(current),
            generation_label(self.prev_template_key)
        );

        self.template = Template::load_generation(self.ctx.store.as_ref(), self.prev_template_key)?;
        self.converge(current).map(Some)
    }

    /// Record that the pass targeting `template_key` has fully converged
    ///
    /// Completions for anything but the current generation are ignored, as
    /// are repeats. Once applied, the generation that was previous before is
    /// deleted from storage. Returns whether the lineage changed.
    pub fn mark_complete(&mut self, template_key: Generation) -> Result<bool, ConvergeError> {
        if template_key != self.template.key() {
            tracing::debug!(
                "[{}] Ignoring stale completion of template {}",
                self.label(),
                generation_label(template_key)
            );
            return Ok(false);
        }
        if self.prev_template_key == template_key {
            tracing::debug!(
                "[{}] Template {} already complete",
                self.label(),
                generation_label(template_key)
            );
            return Ok(false);
        }

        tracing::info!(
            "[{}] Update to template {} complete",
            self.label(),
            generation_label(template_key)
        );

        let superseded = self.prev_template_key;
        self.prev_template_key = template_key;
        self.store()?;

        if let Some(stale) = superseded.filter(|key| Some(*key) != template_key) {
            tracing::debug!("[{}] Deleting template {stale}", self.label());
            self.ctx.store.templates().delete(stale)?;
        }

        Ok(true)
    }

    fn label(&self) -> String {
        match self.key {
            Some(key) => format!("{}({key})", self.name),
            None => self.name.clone(),
        }
    }

    fn converge(&mut self, from: Generation) -> Result<ConvergencePass, ConvergeError> {
        let stack_key = self.store()?;
        let target = self.template.key();
        let store = Arc::clone(&self.ctx.store);

        let template_deps = self.template.dependencies();
        tracing::debug!("[{}] Dependencies:\n{template_deps}", self.label());

        let existing = Resource::load_all_for_stack(store.as_ref(), stack_key)?;
        let matcher = ResourceMatcher::new(&existing, target, from);

        // Dependents first, so requirers already have keys
        let mut current: BTreeMap<String, Resource> = BTreeMap::new();
        for name in template_deps.reverse_topological_order()? {
            let mut rsrc = self.resolve_resource(&matcher, &name, stack_key)?;

            // Requirers from earlier generations stay until they are cleaned up
            for requirer in template_deps.required_by(&name) {
                let key = current
                    .get(&requirer)
                    .and_then(Resource::graph_key)
                    .ok_or(ConvergeError::UnresolvedResource(requirer))?;
                rsrc.requirers.insert(key);
            }

            rsrc.store(store.as_ref())?;
            current.insert(name, rsrc);
        }

        let graph = Arc::new(merged_graph(&existing, &template_deps, &current, from)?.into_validated()?);

        let dispatched = graph.leaves();
        for leaf in &dispatched {
            tracing::debug!("[{}] Dispatching {leaf}", self.label());
            self.ctx.scheduler.check_resource(CheckRequest {
                stack_key,
                graph_key: leaf.key.clone(),
                generation: target,
                payload: serde_json::Map::new(),
                graph: Arc::clone(&graph),
                forward: leaf.forward,
            })?;
        }

        Ok(ConvergencePass {
            stack_key,
            from,
            target,
            graph,
            dispatched,
        })
    }

    fn resolve_resource(
        &self,
        matcher: &ResourceMatcher<'_>,
        name: &str,
        stack_key: StackKey,
    ) -> Result<Resource, ConvergeError> {
        if let Some(existing) = matcher.best_existing_resource(name) {
            return Ok(existing.clone());
        }

        let generation = self.template.key().ok_or(ConvergeError::TemplateNotStored)?;
        let definition = self
            .template
            .definition(name)
            .cloned()
            .ok_or_else(|| ConvergeError::UnresolvedResource(name.to_string()))?;

        tracing::debug!("[{}] New instance of {name}", self.label());
        Ok(Resource::new(name, stack_key, definition, generation))
    }
}

/// Merge the build subgraph of the target template with the cleanup
/// subgraph of every instance not carried forward
fn merged_graph(
    existing: &[Resource],
    template_deps: &DependencyGraph<String>,
    current: &BTreeMap<String, Resource>,
    from: Generation,
) -> Result<ConvergenceGraphBuilder, ConvergeError> {
    let build_node = |name: &String| -> Result<GraphNode, ConvergeError> {
        current
            .get(name)
            .and_then(Resource::graph_key)
            .map(GraphNode::build)
            .ok_or_else(|| ConvergeError::UnresolvedResource(name.clone()))
    };

    let mut deps = template_deps.try_translate(&build_node)?;

    let selected: BTreeSet<ResourceKey> = current.values().filter_map(|r| r.key).collect();
    let cleanup: Vec<(&Resource, GraphKey)> = existing
        .iter()
        .filter_map(|r| r.graph_key().map(|key| (r, key)))
        .filter(|(_, key)| !selected.contains(&key.key))
        .collect();

    for (rsrc, key) in &cleanup {
        let node = GraphNode::cleanup(key.clone());
        deps.add_edge(node.clone(), None);

        // Requirements are torn down after whatever required them, within
        // the generation that declared them
        for requirement in &rsrc.requirements {
            let same_generation = cleanup.iter().filter(|(r, k)| {
                &r.name == requirement && r.template_key == rsrc.template_key && k != key
            });
            for (_, required) in same_generation {
                deps.add_edge(node.clone(), GraphNode::cleanup(required.clone()));
            }
        }

        if template_deps.contains(&rsrc.name) {
            deps.add_edge(build_node(&rsrc.name)?, node);
        }
    }

    // A replaced instance of the old generation goes only once its
    // replacement is done
    let replacing = current
        .values()
        .map(|r| (r, true))
        .chain(cleanup.iter().map(|(r, _)| (*r, false)));
    for (rsrc, carried) in replacing {
        let (Some(replaced_name), Some(key)) = (&rsrc.replaces, rsrc.graph_key()) else {
            continue;
        };
        let node = if carried {
            GraphNode::build(key.clone())
        } else {
            GraphNode::cleanup(key.clone())
        };

        for (_, replaced) in cleanup
            .iter()
            .filter(|(r, k)| &r.name == replaced_name && Some(r.template_key) == from && *k != key)
        {
            deps.add_edge(node.clone(), GraphNode::cleanup(replaced.clone()));
        }
    }

    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedulerError;
    use crate::store::MemoryStore;
    use crate::template::ResourceDefinition;
    use crate::types::TemplateKey;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<CheckRequest>>,
    }

    impl Scheduler for Recorder {
        fn check_resource(&self, request: CheckRequest) -> Result<(), SchedulerError> {
            self.requests.lock().push(request);
            Ok(())
        }
    }

    fn context() -> (Arc<MemoryStore>, Arc<Recorder>, StackContext) {
        let store = Arc::new(MemoryStore::new());
        let scheduler = Arc::new(Recorder::default());
        let ctx = StackContext::new(store.clone(), scheduler.clone());
        (store, scheduler, ctx)
    }

    fn template(resources: &[(&str, &[&str])]) -> Template {
        Template::new(resources.iter().map(|(name, requires)| {
            let definition = requires
                .iter()
                .fold(ResourceDefinition::new("OS::Heat::None"), |d, r| d.depends_on(*r));
            (*name, definition)
        }))
        .unwrap()
    }

    fn names(nodes: &[GraphNode]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| format!("{}/{}", n.key.name, if n.forward { "build" } else { "cleanup" }))
            .collect()
    }

    #[test]
    fn create_dispatches_leaves_of_build_graph() {
        let (_, scheduler, ctx) = context();
        let mut stack = Stack::new(ctx, "web", template(&[("net", &[]), ("server", &["net"])]));

        let pass = stack.create().unwrap();

        assert_eq!(pass.from, None);
        assert_eq!(pass.target, Some(TemplateKey(1)));
        assert_eq!(names(&pass.dispatched), vec!["net/build"]);
        assert!(pass.cleanup_nodes().is_empty());
        assert_eq!(scheduler.requests.lock().len(), 1);
    }

    #[test]
    fn requirers_point_at_resolved_instances() {
        let (store, _, ctx) = context();
        let mut stack = Stack::new(ctx, "web", template(&[("net", &[]), ("server", &["net"])]));
        stack.create().unwrap();

        let rows = Resource::load_all_for_stack(store.as_ref(), stack.key().unwrap()).unwrap();
        let net = rows.iter().find(|r| r.name == "net").unwrap();
        let server = rows.iter().find(|r| r.name == "server").unwrap();

        assert_eq!(net.requirers, BTreeSet::from([server.graph_key().unwrap()]));
        assert!(server.requirers.is_empty());
    }

    #[test]
    fn update_sets_previous_to_from() {
        let (_, _, ctx) = context();
        let mut stack = Stack::new(ctx, "web", template(&[("a", &[])]));
        stack.create().unwrap();

        let pass = stack.update(template(&[("a", &[]), ("b", &["a"])])).unwrap();

        assert_eq!(pass.from, Some(TemplateKey(1)));
        assert_eq!(stack.previous_template_key(), Some(TemplateKey(1)));
        assert_eq!(stack.current_template_key(), Some(TemplateKey(2)));
    }

    #[test]
    fn stale_completion_is_ignored() {
        let (_, _, ctx) = context();
        let mut stack = Stack::new(ctx, "web", template(&[("a", &[])]));
        stack.create().unwrap();
        stack.update(template(&[("b", &[])])).unwrap();

        assert!(!stack.mark_complete(Some(TemplateKey(1))).unwrap());
        assert_eq!(stack.previous_template_key(), Some(TemplateKey(1)));
    }

    #[test]
    fn unsaved_stack_label_has_no_key() {
        let (_, _, ctx) = context();
        let stack = Stack::new(ctx, "web", Template::empty());

        assert_eq!(stack.label(), "web");
        assert_eq!(stack.key(), None);
    }
}
