//! Simulation harness
//!
//! Wires a [`MemoryStore`], a [`ChannelScheduler`] and a [`Reality`] into a
//! [`Simulation`] so whole lifecycles can be driven through the public stack
//! API and checked against what ends up provisioned.

mod converger;
mod reality;
pub mod scenarios;

pub use converger::SimulatedConverger;
pub use reality::{PhysicalResource, Provisioner, Reality};
pub use scenarios::{Scenario, ScenarioReport};

use crate::config::ConvergeConfig;
use crate::error::{ConvergeError, SimulationError};
use crate::scheduler::ChannelScheduler;
use crate::stack::{Stack, StackContext};
use crate::store::{MemoryStore, Storage};
use crate::template::Template;
use crate::types::StackKey;
use std::sync::Arc;

/// Store, scheduler, reality and converger of one simulated deployment
pub struct Simulation {
    /// Rows written by stacks and the converger
    pub store: Arc<MemoryStore>,
    /// Physical resources
    pub reality: Arc<Reality>,
    /// Context handed to stacks
    pub ctx: StackContext,
    converger: SimulatedConverger,
}

impl Simulation {
    /// Create an empty simulation
    #[must_use]
    pub fn new(config: &ConvergeConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let reality = Arc::new(Reality::with_config(config));
        let (scheduler, queue) = ChannelScheduler::channel();
        let ctx = StackContext::new(store.clone(), Arc::new(scheduler));
        let converger = SimulatedConverger::new(ctx.clone(), queue, reality.clone(), config);

        Self {
            store,
            reality,
            ctx,
            converger,
        }
    }

    /// New unsaved stack in this simulation
    #[must_use]
    pub fn stack(&self, name: &str, template: Template) -> Stack {
        Stack::new(self.ctx.clone(), name, template)
    }

    /// Fresh copy of a stored stack
    pub fn load_stack(&self, key: StackKey) -> Result<Stack, ConvergeError> {
        Stack::load(self.ctx.clone(), key)
    }

    /// Process checks until the converger is idle
    pub async fn settle(&mut self) -> Result<usize, SimulationError> {
        self.converger.run_until_idle().await
    }

    /// Number of stored template generations
    #[must_use]
    pub fn template_count(&self) -> usize {
        self.store.templates().len()
    }

    /// Number of stored resource instances
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.store.resources().len()
    }
}
