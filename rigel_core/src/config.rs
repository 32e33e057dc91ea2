//! Simulation configuration.
//!
//! The configuration is assembled upstream (usually from a JSON document)
//! and validated here before any infrastructure is touched.

use crate::error::ConfigurationError;
use crate::requirement::Requirement;
use rigel_env::ContainerSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Name and port of the synthesized ROS master container.
pub const MASTER_NAME: &str = "master";
pub const MASTER_PORT: u16 = 11311;

/// Default overall run timeout (10 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// One containerized ROS package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    pub name: String,
    pub image: String,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub environment: Vec<String>,

    /// Ignored at run time: every container joins the run network
    #[serde(default)]
    pub network: Option<String>,

    #[serde(default)]
    pub ports: Option<BTreeMap<String, Option<u16>>>,

    #[serde(default)]
    pub privileged: bool,

    /// Requirements checked against this container's traffic
    #[serde(default)]
    pub introspection: Vec<Arc<Requirement>>,

    #[serde(default)]
    pub volumes: Vec<String>,
}

impl ContainerDescriptor {
    /// Creates a descriptor with no options set.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: None,
            environment: Vec::new(),
            network: None,
            ports: None,
            privileged: false,
            introspection: Vec::new(),
            volumes: Vec::new(),
        }
    }

    /// The synthesized ROS master for a distribution.
    pub fn master(distro: &str) -> Self {
        Self::new(MASTER_NAME, format!("ros:{}", distro)).with_command("roscore")
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_env(mut self, entry: impl Into<String>) -> Self {
        self.environment.push(entry.into());
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.introspection.push(Arc::new(requirement));
        self
    }

    /// True if this container's traffic is observed.
    pub fn is_observed(&self) -> bool {
        !self.introspection.is_empty()
    }

    /// Launch spec on the given network (hostname = container name).
    pub fn to_spec(&self, network: &str) -> ContainerSpec {
        ContainerSpec {
            name: self.name.clone(),
            image: self.image.clone(),
            command: self.command.clone(),
            env: self.environment.clone(),
            hostname: self.name.clone(),
            network: network.to_string(),
            ports: self.ports.clone().unwrap_or_default(),
            privileged: self.privileged,
            volumes: self.volumes.clone(),
        }
    }
}

/// Everything one run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// ROS distribution (selects the master image)
    pub distro: String,

    #[serde(alias = "containers")]
    pub packages: Vec<ContainerDescriptor>,

    /// Run timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl SimulationConfig {
    pub fn new(distro: impl Into<String>, packages: Vec<ContainerDescriptor>) -> Self {
        Self {
            distro: distro.into(),
            packages,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Parses and validates a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks container names; requirements were validated when built.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut seen = HashSet::new();
        for package in &self.packages {
            if package.name == MASTER_NAME {
                return Err(ConfigurationError::ReservedName(package.name.clone()));
            }
            if !seen.insert(package.name.as_str()) {
                return Err(ConfigurationError::DuplicateContainer(package.name.clone()));
            }
        }
        Ok(())
    }

    /// Number of observed containers.
    pub fn observed_count(&self) -> usize {
        self.packages.iter().filter(|p| p.is_observed()).count()
    }
}
