//! Simulated physical resources

use crate::config::ConvergeConfig;
use crate::error::SimulationError;
use crate::resource::Resource;
use crate::template::ResourceDefinition;
use crate::types::{ResourceKey, TemplateKey};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Brings resource instances into and out of existence
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create or update `resource` to match `definition`
    async fn provision(&self, resource: &Resource, definition: &ResourceDefinition) -> Result<(), SimulationError>;

    /// Remove `resource`; removing something absent is not an error
    async fn teardown(&self, resource: &Resource) -> Result<(), SimulationError>;
}

/// A provisioned resource as reality sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhysicalResource {
    /// Resource name
    pub name: String,
    /// Provider type
    pub resource_type: String,
    /// Properties as last provisioned
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Generation that provisioned them
    pub generation: TemplateKey,
}

/// In-memory reality with optional random delays
#[derive(Debug)]
pub struct Reality {
    resources: Mutex<BTreeMap<ResourceKey, PhysicalResource>>,
    failing: Mutex<BTreeSet<String>>,
    rng: Mutex<StdRng>,
    max_delay_ms: u64,
}

impl Reality {
    /// Create reality without delays
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ConvergeConfig::default())
    }

    /// Create reality using the configured delay bound and seed
    #[must_use]
    pub fn with_config(config: &ConvergeConfig) -> Self {
        Self {
            resources: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(BTreeSet::new()),
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
            max_delay_ms: config.check_delay_ms,
        }
    }

    /// Make every provisioning of `name` fail
    pub fn fail_on(&self, name: impl Into<String>) {
        self.failing.lock().insert(name.into());
    }

    /// Snapshot of every physical resource
    #[must_use]
    pub fn resources(&self) -> BTreeMap<ResourceKey, PhysicalResource> {
        self.resources.lock().clone()
    }

    /// Physical resource of one instance
    #[must_use]
    pub fn get(&self, key: ResourceKey) -> Option<PhysicalResource> {
        self.resources.lock().get(&key).cloned()
    }

    /// Names of every physical resource, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.lock().values().map(|r| r.name.clone()).collect();
        names.sort();
        names
    }

    /// Number of physical resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.lock().len()
    }

    /// Check if nothing is provisioned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.lock().is_empty()
    }

    async fn delay(&self) {
        if self.max_delay_ms == 0 {
            return;
        }
        let millis = self.rng.lock().random_range(0..=self.max_delay_ms);
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

impl Default for Reality {
    fn default() -> Self {
        Self::new()
    }
}

fn instance_key(resource: &Resource) -> Result<ResourceKey, SimulationError> {
    resource.key.ok_or_else(|| SimulationError::Provision {
        resource: resource.name.clone(),
        message: "instance has not been stored".to_string(),
    })
}

#[async_trait]
impl Provisioner for Reality {
    async fn provision(&self, resource: &Resource, definition: &ResourceDefinition) -> Result<(), SimulationError> {
        let key = instance_key(resource)?;
        self.delay().await;

        if self.failing.lock().contains(&resource.name) {
            return Err(SimulationError::Provision {
                resource: resource.name.clone(),
                message: "reality refused the change".to_string(),
            });
        }

        tracing::debug!("Provisioned {}({key})", resource.name);
        self.resources.lock().insert(
            key,
            PhysicalResource {
                name: resource.name.clone(),
                resource_type: definition.resource_type.clone(),
                properties: definition.properties.clone(),
                generation: resource.template_key,
            },
        );
        Ok(())
    }

    async fn teardown(&self, resource: &Resource) -> Result<(), SimulationError> {
        let key = instance_key(resource)?;
        self.delay().await;

        if self.resources.lock().remove(&key).is_some() {
            tracing::debug!("Tore down {}({key})", resource.name);
        }
        Ok(())
    }
}
