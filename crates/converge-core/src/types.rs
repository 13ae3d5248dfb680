//! Core identifiers for stacks, template generations and resource instances

use converge_graph::{DependencyGraph, ValidatedGraph};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! storage_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw storage value
            #[inline]
            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

storage_key!(
    /// Storage key of a stack row
    StackKey
);
storage_key!(
    /// Storage key of one template generation
    TemplateKey
);
storage_key!(
    /// Storage key of one resource instance
    ResourceKey
);

/// A template generation; `None` is the empty template
pub type Generation = Option<TemplateKey>;

/// Human-readable form of a generation for log lines
#[must_use]
pub fn generation_label(generation: Generation) -> String {
    generation.map_or_else(|| "empty".to_string(), |key| key.to_string())
}

/// Identity of one resource instance within one template generation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphKey {
    /// Resource name from the template
    pub name: String,
    /// Storage key of the instance
    pub key: ResourceKey,
}

impl GraphKey {
    /// Create new graph key
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, key: ResourceKey) -> Self {
        Self {
            name: name.into(),
            key,
        }
    }
}

impl fmt::Display for GraphKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.key)
    }
}

/// Node of a merged convergence graph
///
/// `forward` nodes build the new template; the others clean up instances
/// that are being replaced or removed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphNode {
    /// Resource instance
    pub key: GraphKey,
    /// Build (`true`) or cleanup (`false`)
    pub forward: bool,
}

impl GraphNode {
    /// Node of the build subgraph
    #[inline]
    #[must_use]
    pub fn build(key: GraphKey) -> Self {
        Self { key, forward: true }
    }

    /// Node of the cleanup subgraph
    #[inline]
    #[must_use]
    pub fn cleanup(key: GraphKey) -> Self {
        Self {
            key,
            forward: false,
        }
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = if self.forward { "build" } else { "cleanup" };
        write!(f, "{}/{phase}", self.key)
    }
}

/// Merged graph under construction
pub type ConvergenceGraphBuilder = DependencyGraph<GraphNode>;

/// Merged graph proven acyclic, as handed to the scheduler
pub type ConvergenceGraph = ValidatedGraph<GraphNode>;
