//! Scenario runner - executes run plans against the simulated collaborators.

use crate::bus::SimMessageBus;
use crate::context::SimContext;
use crate::plan::{Expectation, RunPlan};
use crate::runtime::{RuntimeEvent, SimContainerRuntime};
use crate::scenarios::ScenarioId;

use rigel_core::{
    OrchestratorError, OrchestratorOptions, Report, SimulationOrchestrator, SimulationOutcome,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario or plan that was run
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Whether the run matched its expectation
    pub passed: bool,

    /// Terminal outcome; `None` when start-up failed
    pub outcome: Option<SimulationOutcome>,

    /// Virtual monitoring time in seconds
    pub elapsed_secs: f64,

    pub report: Report,

    pub teardown_errors: Vec<String>,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    pub containers_started: usize,
    pub containers_removed: usize,
    pub removal_failures: usize,
    pub networks_created: usize,
    pub networks_removed: usize,
    pub bridge_connections: usize,
    pub subscriptions: usize,
    pub unsubscribed: usize,
    pub closed_connections: usize,
    pub messages_delivered: u64,
}

impl ScenarioMetrics {
    fn collect(runtime: &SimContainerRuntime, bus: &SimMessageBus) -> Self {
        let mut metrics = ScenarioMetrics::default();
        for event in runtime.journal() {
            match event {
                RuntimeEvent::NetworkCreated(_) => metrics.networks_created += 1,
                RuntimeEvent::ContainerStarted(_) => metrics.containers_started += 1,
                RuntimeEvent::ContainerRemoved(_) => metrics.containers_removed += 1,
                RuntimeEvent::RemovalFailed(_) => metrics.removal_failures += 1,
                RuntimeEvent::NetworkRemoved(_) => metrics.networks_removed += 1,
            }
        }
        let journal = bus.journal();
        metrics.bridge_connections = journal.connections.len();
        metrics.subscriptions = journal.subscriptions.len();
        metrics.unsubscribed = journal.released.len();
        metrics.closed_connections = journal.closed.len();
        metrics.messages_delivered = journal.delivered;
        metrics
    }
}

/// Runs scenarios and plans.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Upper bound of random delivery delay
    jitter_ms: u64,

    /// Monitoring poll interval
    poll_interval: Duration,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            jitter_ms: 0,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Sets the delivery jitter.
    pub fn with_jitter(mut self, jitter_ms: u64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Runs a built-in scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        match scenario.plan() {
            Ok(plan) => self.run_plan(scenario.name(), plan).await,
            Err(e) => self.rejected(scenario.name(), e.to_string()),
        }
    }

    /// Runs a plan in a fresh simulated world.
    pub async fn run_plan(&self, name: &str, plan: RunPlan) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", name, self.seed);

        let ctx = SimContext::shared(self.seed);
        let runtime = Arc::new(SimContainerRuntime::with_faults(plan.faults.runtime.clone()));
        let bus = Arc::new(
            SimMessageBus::new(Arc::clone(&ctx), Arc::clone(&runtime))
                .with_feeds(plan.feeds.iter().cloned())
                .with_faults(plan.faults.bus.clone())
                .with_jitter(self.jitter_ms),
        );

        let options = OrchestratorOptions::from_config(&plan.config)
            .with_poll_interval(self.poll_interval);
        let orchestrator = match SimulationOrchestrator::new(
            ctx,
            Arc::clone(&runtime),
            Arc::clone(&bus),
            plan.config.clone(),
        ) {
            Ok(orchestrator) => orchestrator.with_options(options),
            Err(e) => return self.rejected(name, e.to_string()),
        };

        let result = orchestrator.run().await;
        let metrics = ScenarioMetrics::collect(&runtime, &bus);

        let (outcome, elapsed, report, teardown_errors, error) = match result {
            Ok(run) => (
                Some(run.outcome),
                run.elapsed,
                run.report,
                run.teardown_errors,
                None,
            ),
            Err(OrchestratorError::Infrastructure {
                source,
                teardown_errors,
            }) => (
                None,
                Duration::ZERO,
                Report::default(),
                teardown_errors,
                Some(source.to_string()),
            ),
            Err(e) => (None, Duration::ZERO, Report::default(), Vec::new(), Some(e.to_string())),
        };

        let failure_reason = match (plan.expect, outcome, &error) {
            (Some(Expectation::Outcome(expected)), Some(actual), _) if expected == actual => None,
            (Some(Expectation::Outcome(expected)), Some(actual), _) => {
                Some(format!("expected {}, got {}", expected, actual))
            }
            (Some(Expectation::Outcome(expected)), None, error) => Some(format!(
                "expected {}, start-up failed: {}",
                expected,
                error.as_deref().unwrap_or("unknown error")
            )),
            (Some(Expectation::InfrastructureFailure), None, _) => None,
            (Some(Expectation::InfrastructureFailure), Some(actual), _) => {
                Some(format!("expected start-up failure, got {}", actual))
            }
            (None, Some(SimulationOutcome::AllSatisfied), _) => None,
            (None, Some(actual), _) => Some(format!("simulation ended {}", actual)),
            (None, None, error) => error.clone(),
        };

        let passed = failure_reason.is_none();
        if passed {
            info!("Scenario {} passed", name);
        } else {
            warn!(
                "Scenario {} failed: {}",
                name,
                failure_reason.as_deref().unwrap_or_default()
            );
        }

        ScenarioResult {
            scenario: name.to_string(),
            seed: self.seed,
            passed,
            outcome,
            elapsed_secs: elapsed.as_secs_f64(),
            report,
            teardown_errors,
            failure_reason,
            metrics,
        }
    }

    fn rejected(&self, name: &str, reason: String) -> ScenarioResult {
        warn!("Scenario {} rejected: {}", name, reason);
        ScenarioResult {
            scenario: name.to_string(),
            seed: self.seed,
            passed: false,
            outcome: None,
            elapsed_secs: 0.0,
            report: Report::default(),
            teardown_errors: Vec::new(),
            failure_reason: Some(reason),
            metrics: ScenarioMetrics::default(),
        }
    }
}
