//! Resource instances attached to a stack

use crate::error::StoreError;
use crate::store::{Record, Storage};
use crate::template::ResourceDefinition;
use crate::types::{GraphKey, ResourceKey, StackKey, TemplateKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Stored form of a resource instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Name from the template
    pub name: String,
    /// Owning stack
    pub stack_key: StackKey,
    /// Generation last converged to
    pub template_key: TemplateKey,
    /// Definition last converged to
    pub definition: ResourceDefinition,
    /// Names this instance requires
    pub requirements: BTreeSet<String>,
    /// Instances that require this one
    pub requirers: BTreeSet<GraphKey>,
    /// Name of the resource this instance replaces
    pub replaces: Option<String>,
}

impl Record for ResourceRecord {
    type Key = ResourceKey;
    const KIND: &'static str = "resource";
}

/// One concrete instance of a named resource
///
/// Several instances of the same name may coexist while a replacement is
/// in flight; each belongs to the generation it was last converged for.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Storage key; `None` until stored
    pub key: Option<ResourceKey>,
    /// Name from the template
    pub name: String,
    /// Owning stack
    pub stack_key: StackKey,
    /// Generation the instance was created for or last converged to
    pub template_key: TemplateKey,
    /// Definition the instance was built from
    pub definition: ResourceDefinition,
    /// Names this instance requires
    pub requirements: BTreeSet<String>,
    /// Instances that require this one, as of the last pass
    pub requirers: BTreeSet<GraphKey>,
    /// Name of the resource this instance supersedes
    pub replaces: Option<String>,
}

impl Resource {
    /// Create an unsaved instance of `name` for a generation
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        stack_key: StackKey,
        definition: ResourceDefinition,
        template_key: TemplateKey,
    ) -> Self {
        Self {
            key: None,
            name: name.into(),
            stack_key,
            template_key,
            requirements: definition.requires.clone(),
            definition,
            requirers: BTreeSet::new(),
            replaces: None,
        }
    }

    /// Graph identity; `None` until stored
    #[must_use]
    pub fn graph_key(&self) -> Option<GraphKey> {
        self.key.map(|key| GraphKey::new(self.name.clone(), key))
    }

    /// Rebuild from a stored row
    #[must_use]
    pub fn from_record(key: ResourceKey, record: ResourceRecord) -> Self {
        Self {
            key: Some(key),
            name: record.name,
            stack_key: record.stack_key,
            template_key: record.template_key,
            definition: record.definition,
            requirements: record.requirements,
            requirers: record.requirers,
            replaces: record.replaces,
        }
    }

    /// Stored form
    #[must_use]
    pub fn to_record(&self) -> ResourceRecord {
        ResourceRecord {
            name: self.name.clone(),
            stack_key: self.stack_key,
            template_key: self.template_key,
            definition: self.definition.clone(),
            requirements: self.requirements.clone(),
            requirers: self.requirers.clone(),
            replaces: self.replaces.clone(),
        }
    }

    /// Load one instance
    pub fn load(store: &dyn Storage, key: ResourceKey) -> Result<Self, StoreError> {
        let record = store.resources().read(key)?;
        Ok(Self::from_record(key, record))
    }

    /// Load every instance attached to a stack, in key order
    pub fn load_all_for_stack(store: &dyn Storage, stack_key: StackKey) -> Result<Vec<Self>, StoreError> {
        store
            .resources()
            .find(&|row| row.stack_key == stack_key)?
            .into_iter()
            .map(|key| Self::load(store, key))
            .collect()
    }

    /// Create or update the row; returns the storage key
    pub fn store(&mut self, store: &dyn Storage) -> Result<ResourceKey, StoreError> {
        match self.key {
            Some(key) => {
                store.resources().update(key, self.to_record())?;
                Ok(key)
            }
            None => {
                let key = store.resources().create(self.to_record())?;
                self.key = Some(key);
                Ok(key)
            }
        }
    }

    /// Delete the row
    pub fn delete(&self, store: &dyn Storage) -> Result<(), StoreError> {
        match self.key {
            Some(key) => store.resources().delete(key),
            None => Ok(()),
        }
    }
}
