//! Converge Core - convergence graph builder and driver
//!
//! Reconciles a declared template of named resources against the resource
//! instances already attached to a stack:
//! - Matches instances across template generations
//! - Merges the build order of the new template with the teardown order of
//!   replaced or removed instances into one validated graph
//! - Hands the graph's leaves to a scheduler
//! - Tracks the current and previous generation, ignoring stale completions
//!   and supporting rollback
//!
//! # Example
//!
//! ```rust,ignore
//! use converge_core::prelude::*;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), ConvergeError> {
//! let (scheduler, _queue) = ChannelScheduler::channel();
//! let ctx = StackContext::new(Arc::new(MemoryStore::new()), Arc::new(scheduler));
//!
//! let template = Template::new([
//!     ("net", ResourceDefinition::new("OS::Neutron::Net")),
//!     ("server", ResourceDefinition::new("OS::Nova::Server").depends_on("net")),
//! ])?;
//!
//! let mut stack = Stack::new(ctx, "web", template);
//! let pass = stack.create()?;
//! println!("Dispatched {} leaves", pass.dispatched.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod matcher;
pub mod resource;
pub mod scheduler;
pub mod stack;
pub mod store;
pub mod template;
pub mod test_harness;
pub mod types;

pub use config::ConvergeConfig;
pub use error::{ConfigError, ConvergeError, SchedulerError, SimulationError, StoreError, TemplateError};
pub use matcher::{best_existing_resource, ResourceMatcher};
pub use resource::{Resource, ResourceRecord};
pub use scheduler::{ChannelScheduler, CheckQueue, CheckRequest, Scheduler};
pub use stack::{ConvergencePass, Stack, StackContext, StackRecord};
pub use store::{MemoryStore, Record, Repository, Storage};
pub use template::{ResourceDefinition, Template, TemplateRecord};
pub use types::{
    ConvergenceGraph, ConvergenceGraphBuilder, Generation, GraphKey, GraphNode, ResourceKey, StackKey, TemplateKey,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Converge Core
    pub use crate::{
        ChannelScheduler, ConvergeConfig, ConvergeError, ConvergencePass, GraphKey, GraphNode, MemoryStore,
        ResourceDefinition, Scheduler, Stack, StackContext, Storage, Template,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
