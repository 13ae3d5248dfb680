//! Built-in lifecycle scenarios

use super::Simulation;
use crate::config::ConvergeConfig;
use crate::error::{ConvergeError, SimulationError};
use crate::template::{ResourceDefinition, Template};
use crate::types::{generation_label, Generation};
use serde::Serialize;
use std::fmt::Write as _;

/// A named lifecycle driven through the stack API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Create a three-tier stack
    Create,
    /// Change a property and add a resource
    Update,
    /// Swap one resource for another
    RemoveResource,
    /// Start an update, then roll it back before it converges
    Rollback,
    /// Create, then delete everything
    Delete,
}

impl Scenario {
    /// Every built-in scenario
    pub const ALL: [Self; 5] = [
        Self::Create,
        Self::Update,
        Self::RemoveResource,
        Self::Rollback,
        Self::Delete,
    ];

    /// Command-line name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::RemoveResource => "remove-resource",
            Self::Rollback => "rollback",
            Self::Delete => "delete",
        }
    }

    /// One-line description
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Create => "create net, subnet and server",
            Self::Update => "resize the server and attach a new volume",
            Self::RemoveResource => "replace a load balancer with a web server",
            Self::Rollback => "roll back an update that has not converged",
            Self::Delete => "delete every resource of a stack",
        }
    }

    /// Look up a scenario by command-line name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Run the scenario in a fresh simulation
    pub async fn run(self, config: &ConvergeConfig) -> Result<ScenarioReport, SimulationError> {
        tracing::info!("Running scenario {}", self.name());
        let mut sim = Simulation::new(config);
        let mut checks = 0;

        let (initial, expected) = match self {
            Self::RemoveResource => (pair("lb")?, vec!["lb", "net"]),
            _ => (three_tier("m1.small")?, vec!["net", "server", "subnet"]),
        };

        let mut stack = sim.stack("demo", initial);
        stack.create()?;
        checks += sim.settle().await?;
        let key = stack.key().ok_or_else(|| ConvergeError::StackNotStored(stack.name().to_string()))?;

        let expected = match self {
            Self::Create => expected,
            Self::Update => {
                sim.load_stack(key)?.update(with_volume()?)?;
                checks += sim.settle().await?;
                vec!["net", "server", "subnet", "volume"]
            }
            Self::RemoveResource => {
                sim.load_stack(key)?.update(pair("web")?)?;
                checks += sim.settle().await?;
                vec!["net", "web"]
            }
            Self::Rollback => {
                let mut stack = sim.load_stack(key)?;
                stack.update(with_volume()?)?;
                stack.rollback()?;
                checks += sim.settle().await?;
                expected
            }
            Self::Delete => {
                sim.load_stack(key)?.delete()?;
                checks += sim.settle().await?;
                Vec::new()
            }
        };

        let stack = sim.load_stack(key)?;
        Ok(ScenarioReport {
            scenario: self.name(),
            expected: expected.into_iter().map(String::from).collect(),
            reality: sim.reality.names(),
            current: stack.current_template_key(),
            previous: stack.previous_template_key(),
            templates: sim.template_count(),
            resources: sim.resource_count(),
            checks,
        })
    }
}

fn three_tier(flavor: &str) -> Result<Template, ConvergeError> {
    Ok(Template::new([
        ("net", ResourceDefinition::new("OS::Neutron::Net")),
        (
            "subnet",
            ResourceDefinition::new("OS::Neutron::Subnet")
                .with_property("cidr", "10.0.0.0/24")
                .depends_on("net"),
        ),
        (
            "server",
            ResourceDefinition::new("OS::Nova::Server")
                .with_property("flavor", flavor)
                .depends_on("subnet"),
        ),
    ])?)
}

fn with_volume() -> Result<Template, ConvergeError> {
    let base = three_tier("m1.large")?;
    let mut resources = base.resources().clone();
    resources.insert(
        "volume".to_string(),
        ResourceDefinition::new("OS::Cinder::Volume").with_property("size", 10),
    );
    if let Some(server) = resources.get_mut("server") {
        server.requires.insert("volume".to_string());
    }
    Ok(Template::new(resources)?)
}

fn pair(frontend: &str) -> Result<Template, ConvergeError> {
    Ok(Template::new([
        ("net", ResourceDefinition::new("OS::Neutron::Net")),
        (frontend, ResourceDefinition::new("OS::Heat::None").depends_on("net")),
    ])?)
}

/// Outcome of one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub scenario: &'static str,
    /// Resource names that should exist at the end
    pub expected: Vec<String>,
    /// Resource names that do exist
    pub reality: Vec<String>,
    /// Final current generation
    pub current: Generation,
    /// Final previous generation
    pub previous: Generation,
    /// Template generations still stored
    pub templates: usize,
    /// Resource instances still stored
    pub resources: usize,
    /// Checks processed by the converger
    pub checks: usize,
}

impl ScenarioReport {
    /// Check reality matches and the lineage settled
    #[must_use]
    pub fn passed(&self) -> bool {
        self.reality == self.expected && self.current == self.previous
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        let _ = writeln!(report, "=== Scenario: {} ===", self.scenario);
        let _ = writeln!(report, "Expected: {:?}", self.expected);
        let _ = writeln!(report, "Reality:  {:?}", self.reality);
        let _ = writeln!(report, "Current template: {}", generation_label(self.current));
        let _ = writeln!(report, "Previous template: {}", generation_label(self.previous));
        let _ = writeln!(report, "Stored templates: {}", self.templates);
        let _ = writeln!(report, "Stored resources: {}", self.resources);
        let _ = writeln!(report, "Checks: {}", self.checks);
        let _ = writeln!(report, "=== Result: {} ===", if self.passed() { "PASS" } else { "FAIL" });

        report
    }
}
