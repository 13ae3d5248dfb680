//! Templates: named resource definitions and their requirements
//!
//! A stored template is one *generation* of a stack. The empty template
//! (no key, no resources) stands for "nothing deployed".

use crate::error::{StoreError, TemplateError};
use crate::store::{Record, Storage};
use crate::types::{Generation, TemplateKey};
use converge_graph::DependencyGraph;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Definition of one resource in a template
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Provider type, e.g. `OS::Nova::Server`
    pub resource_type: String,
    /// Desired properties
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Names of resources this one requires
    pub requires: BTreeSet<String>,
}

impl ResourceDefinition {
    /// Create definition of the given type
    #[must_use]
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Self::default()
        }
    }

    /// With property
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// With requirement on another resource of the same template
    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.requires.insert(name.into());
        self
    }
}

/// Stored form of a template
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemplateRecord {
    /// Resource definitions in declaration order
    pub resources: IndexMap<String, ResourceDefinition>,
}

impl Record for TemplateRecord {
    type Key = TemplateKey;
    const KIND: &'static str = "template";
}

/// One template generation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    key: Generation,
    resources: IndexMap<String, ResourceDefinition>,
}

impl Template {
    /// The empty template: nothing deployed
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create an unsaved template
    ///
    /// Every requirement must name a resource of the same template.
    pub fn new<I, S>(resources: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = (S, ResourceDefinition)>,
        S: Into<String>,
    {
        let resources: IndexMap<String, ResourceDefinition> = resources
            .into_iter()
            .map(|(name, definition)| (name.into(), definition))
            .collect();

        for (name, definition) in &resources {
            if let Some(unknown) = definition.requires.iter().find(|r| !resources.contains_key(*r)) {
                return Err(TemplateError::UnknownRequirement {
                    resource: name.clone(),
                    requirement: unknown.clone(),
                });
            }
        }

        Ok(Self {
            key: None,
            resources,
        })
    }

    /// Storage key; `None` for the empty or an unsaved template
    #[inline]
    #[must_use]
    pub fn key(&self) -> Generation {
        self.key
    }

    /// Resource definitions in declaration order
    #[inline]
    #[must_use]
    pub fn resources(&self) -> &IndexMap<String, ResourceDefinition> {
        &self.resources
    }

    /// Definition of one resource
    #[inline]
    #[must_use]
    pub fn definition(&self, name: &str) -> Option<&ResourceDefinition> {
        self.resources.get(name)
    }

    /// Check if the template defines no resources
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Name-keyed dependency graph: an edge `B -> A` for "A requires B"
    #[must_use]
    pub fn dependencies(&self) -> DependencyGraph<String> {
        let mut deps = DependencyGraph::new();
        for (name, definition) in &self.resources {
            deps.add_node(name.clone());
            for requirement in &definition.requires {
                deps.add_edge(requirement.clone(), Some(name.clone()));
            }
        }
        deps
    }

    /// Load a stored generation
    pub fn load(store: &dyn Storage, key: TemplateKey) -> Result<Self, StoreError> {
        let record = store.templates().read(key)?;
        Ok(Self {
            key: Some(key),
            resources: record.resources,
        })
    }

    /// Load a generation; `None` yields the empty template
    pub fn load_generation(store: &dyn Storage, generation: Generation) -> Result<Self, StoreError> {
        match generation {
            Some(key) => Self::load(store, key),
            None => Ok(Self::empty()),
        }
    }

    /// Persist as a new generation unless already stored
    ///
    /// The empty template is never stored; its generation stays `None`.
    pub fn store(&mut self, store: &dyn Storage) -> Result<Generation, StoreError> {
        if self.key.is_none() && !self.resources.is_empty() {
            let key = store.templates().create(self.to_record())?;
            tracing::debug!("Stored template generation {key}");
            self.key = Some(key);
        }
        Ok(self.key)
    }

    /// Stored form
    #[must_use]
    pub fn to_record(&self) -> TemplateRecord {
        TemplateRecord {
            resources: self.resources.clone(),
        }
    }
}
