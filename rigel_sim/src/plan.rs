//! Run plans: a simulation configuration plus the scripted world it runs in.

use crate::bus::{BusFaults, Feed};
use crate::runtime::RuntimeFaults;
use rigel_core::{ConfigurationError, SimulationConfig, SimulationOutcome};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Faults injected into both simulated collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Faults {
    #[serde(flatten)]
    pub runtime: RuntimeFaults,

    #[serde(flatten)]
    pub bus: BusFaults,
}

/// Verdict a plan expects, checked by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    Outcome(SimulationOutcome),
    /// Start-up fails and the run is torn down.
    InfrastructureFailure,
}

/// Everything needed to run one simulated simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    pub config: SimulationConfig,

    #[serde(default)]
    pub feeds: Vec<Feed>,

    #[serde(default)]
    pub faults: Faults,

    #[serde(default)]
    pub expect: Option<Expectation>,
}

impl RunPlan {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            feeds: Vec::new(),
            faults: Faults::default(),
            expect: None,
        }
    }

    pub fn with_feed(mut self, feed: Feed) -> Self {
        self.feeds.push(feed);
        self
    }

    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    pub fn expecting(mut self, expect: Expectation) -> Self {
        self.expect = Some(expect);
        self
    }

    /// Parses a plan and validates its configuration.
    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        let plan: Self =
            serde_json::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        plan.config.validate()?;
        Ok(plan)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }
}
