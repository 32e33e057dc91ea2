//! Simulation orchestrator - the run lifecycle state machine.
//!
//! ```text
//! Idle ─► NetworkCreated ─► MasterStarted ─► NodesStarted ─► Monitoring
//!   │            │                │                              │
//!   │            └────────────────┴── start-up failure ──┐       ▼
//!   │                                                    │  TimedOut | BreakpointHit
//!   │                                                    │     | AllSatisfied
//!   └────────────────────────────────────────────────────┴───────┴──► TornDown ─► report
//! ```
//!
//! The run state is threaded through each phase function; `run()` always
//! calls `tear_down()` after bring-up, whatever bring-up returned.

use crate::aggregator::{Report, RequirementsAggregator};
use crate::bridge::BridgeConnection;
use crate::config::{ContainerDescriptor, SimulationConfig, MASTER_PORT};
use crate::error::{ConfigurationError, OrchestratorError};
use rigel_env::{ContainerRuntime, ContainerStatus, MessageBus, RunContext, RuntimeError};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Prefix of every run network name.
pub const NETWORK_PREFIX: &str = "rigel-simulation";

/// Port of the bus bridge inside observed containers.
pub const BRIDGE_PORT: u16 = 9090;

/// Tunables for one orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Overall monitoring deadline
    pub timeout: Duration,

    /// Delay between two termination checks
    pub poll_interval: Duration,

    pub bridge_port: u16,

    /// Bound on each bridge connect
    pub connect_timeout: Duration,

    pub network_driver: String,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(100),
            bridge_port: BRIDGE_PORT,
            connect_timeout: Duration::from_secs(60),
            network_driver: "bridge".to_string(),
        }
    }
}

impl OrchestratorOptions {
    /// Defaults with the timeout taken from the configuration.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            timeout: config.timeout(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

}

/// Terminal outcome of the monitoring loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationOutcome {
    TimedOut,
    BreakpointHit,
    AllSatisfied,
}

impl SimulationOutcome {
    /// Termination decision for one polling tick.
    ///
    /// Checked in fixed priority: timeout, then breakpoint, then full
    /// satisfaction. A breakpoint in the same tick as full satisfaction is
    /// reported as a breakpoint.
    pub fn decide(timed_out: bool, breakpoint_hit: bool, all_satisfied: bool) -> Option<Self> {
        if timed_out {
            Some(SimulationOutcome::TimedOut)
        } else if breakpoint_hit {
            Some(SimulationOutcome::BreakpointHit)
        } else if all_satisfied {
            Some(SimulationOutcome::AllSatisfied)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SimulationOutcome::TimedOut => "TIMED_OUT",
            SimulationOutcome::BreakpointHit => "BREAKPOINT_HIT",
            SimulationOutcome::AllSatisfied => "ALL_SATISFIED",
        }
    }
}

impl std::fmt::Display for SimulationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Idle,
    NetworkCreated,
    MasterStarted,
    NodesStarted,
    Monitoring,
    Finished,
    TornDown,
}

/// Mutable record of one run, threaded through the phase functions.
struct RunState {
    run_id: Uuid,
    network: String,
    /// Master first, then the configured containers in declaration order
    containers: Vec<ContainerDescriptor>,
    /// Containers whose launch succeeded; these are removed at teardown
    started: Vec<String>,
    network_created: bool,
    master_address: Option<IpAddr>,
    phase: RunPhase,
    aggregator: RequirementsAggregator,
    elapsed: Duration,
}

impl RunState {
    fn new(config: &SimulationConfig) -> Self {
        let run_id = Uuid::new_v4();
        let mut containers = Vec::with_capacity(config.packages.len() + 1);
        containers.push(ContainerDescriptor::master(&config.distro));
        containers.extend(config.packages.iter().cloned());

        Self {
            run_id,
            network: network_name(&run_id),
            containers,
            started: Vec::new(),
            network_created: false,
            master_address: None,
            phase: RunPhase::Idle,
            aggregator: RequirementsAggregator::new(),
            elapsed: Duration::ZERO,
        }
    }

    fn advance(&mut self, next: RunPhase) {
        debug!("Run {}: {:?} -> {:?}", self.run_id, self.phase, next);
        self.phase = next;
    }
}

/// Run-unique network name.
pub fn network_name(run_id: &Uuid) -> String {
    format!("{}-{}", NETWORK_PREFIX, run_id)
}

/// Environment entries binding a node to the master.
pub fn node_environment(master_address: IpAddr, hostname: &str) -> [String; 2] {
    [
        format!("ROS_MASTER_URI=http://{}:{}", master_address, MASTER_PORT),
        format!("ROS_HOSTNAME={}", hostname),
    ]
}

/// Result of a run that reached monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub network: String,
    pub outcome: SimulationOutcome,
    /// Monitoring time until the terminal decision
    pub elapsed: Duration,
    pub report: Report,
    /// Removal failures collected during teardown
    pub teardown_errors: Vec<String>,
}

impl RunReport {
    /// True only when every requirement was satisfied.
    pub fn passed(&self) -> bool {
        self.outcome == SimulationOutcome::AllSatisfied
    }
}

/// Drives one simulation run against the given collaborators.
pub struct SimulationOrchestrator<Ctx, Rt, Bus> {
    ctx: Arc<Ctx>,
    runtime: Arc<Rt>,
    bus: Arc<Bus>,
    config: SimulationConfig,
    options: OrchestratorOptions,
}

impl<Ctx, Rt, Bus> SimulationOrchestrator<Ctx, Rt, Bus>
where
    Ctx: RunContext,
    Rt: ContainerRuntime,
    Bus: MessageBus,
{
    /// Creates an orchestrator for a validated configuration.
    pub fn new(
        ctx: Arc<Ctx>,
        runtime: Arc<Rt>,
        bus: Arc<Bus>,
        config: SimulationConfig,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let options = OrchestratorOptions::from_config(&config);
        Ok(Self {
            ctx,
            runtime,
            bus,
            config,
            options,
        })
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Runs the whole lifecycle and returns the final report.
    ///
    /// # Errors
    /// * `OrchestratorError::Infrastructure` - network or container start-up
    ///   failed; whatever was started has been torn down
    pub async fn run(&self) -> Result<RunReport, OrchestratorError> {
        let mut state = RunState::new(&self.config);
        info!(
            "Starting simulation {} ({} containers, timeout {:?})",
            state.run_id,
            state.containers.len(),
            self.options.timeout
        );

        let outcome = match self.bring_up(&mut state).await {
            Ok(()) => Ok(self.monitor(&mut state).await),
            Err(e) => {
                error!("Simulation start-up failed: {}", e);
                Err(e)
            }
        };

        let teardown_errors = self.tear_down(&mut state).await;

        match outcome {
            Ok(outcome) => Ok(RunReport {
                run_id: state.run_id,
                network: state.network.clone(),
                outcome,
                elapsed: state.elapsed,
                report: state.aggregator.report(),
                teardown_errors,
            }),
            Err(source) => Err(OrchestratorError::Infrastructure {
                source,
                teardown_errors,
            }),
        }
    }

    async fn bring_up(&self, state: &mut RunState) -> Result<(), RuntimeError> {
        self.create_network(state).await?;
        self.start_master(state).await?;
        self.start_nodes(state).await
    }

    async fn create_network(&self, state: &mut RunState) -> Result<(), RuntimeError> {
        self.runtime
            .create_network(&state.network, &self.options.network_driver)
            .await?;
        state.network_created = true;
        info!("Created Docker network {}", state.network);
        state.advance(RunPhase::NetworkCreated);
        Ok(())
    }

    /// Launches one container and waits until it is running.
    async fn start_container(
        &self,
        state: &mut RunState,
        descriptor: &ContainerDescriptor,
    ) -> Result<IpAddr, RuntimeError> {
        let spec = descriptor.to_spec(&state.network);
        self.runtime.run_container(&spec).await?;
        state.started.push(descriptor.name.clone());

        self.runtime
            .wait_for_status(&descriptor.name, ContainerStatus::Running)
            .await?;
        let address = self
            .runtime
            .container_address(&descriptor.name, &state.network)
            .await?;
        info!("Created container '{}' ({})", descriptor.name, address);
        Ok(address)
    }

    async fn start_master(&self, state: &mut RunState) -> Result<(), RuntimeError> {
        let master = state.containers[0].clone();
        let address = self.start_container(state, &master).await?;
        state.master_address = Some(address);
        state.advance(RunPhase::MasterStarted);
        Ok(())
    }

    async fn start_nodes(&self, state: &mut RunState) -> Result<(), RuntimeError> {
        let master_address = state
            .master_address
            .ok_or_else(|| RuntimeError::NotFound(crate::config::MASTER_NAME.to_string()))?;

        for index in 1..state.containers.len() {
            let descriptor = {
                let node = &mut state.containers[index];
                node.environment
                    .extend(node_environment(master_address, &node.name));
                node.clone()
            };

            let address = self.start_container(state, &descriptor).await?;

            if descriptor.is_observed() {
                let bridge = self.observe(&descriptor, address).await;
                state.aggregator.push(bridge);
            }
        }

        state.advance(RunPhase::NodesStarted);
        Ok(())
    }

    /// Connects to a container's bridge and registers its requirements.
    ///
    /// Connectivity failures leave the container unobserved.
    async fn observe(&self, descriptor: &ContainerDescriptor, address: IpAddr) -> BridgeConnection {
        let mut bridge = match BridgeConnection::open(
            self.bus.as_ref(),
            &descriptor.name,
            address,
            self.options.bridge_port,
            self.options.connect_timeout,
        )
        .await
        {
            Ok(bridge) => bridge,
            Err(e) => {
                warn!(
                    "Container '{}' runs unobserved, its requirements cannot be satisfied: {}",
                    descriptor.name, e
                );
                BridgeConnection::unobserved(&descriptor.name, address, self.options.bridge_port)
            }
        };

        for requirement in &descriptor.introspection {
            bridge.register(self.ctx.as_ref(), Arc::clone(requirement)).await;
        }
        bridge
    }

    async fn monitor(&self, state: &mut RunState) -> SimulationOutcome {
        state.advance(RunPhase::Monitoring);
        let start = self.ctx.now();
        warn!("Simulation started.");

        loop {
            let elapsed = self.ctx.now().saturating_sub(start);
            let decision = SimulationOutcome::decide(
                elapsed > self.options.timeout,
                state.aggregator.any_breakpoint_satisfied(),
                state.aggregator.all_satisfied(),
            );

            if let Some(outcome) = decision {
                let secs = elapsed.as_secs_f64();
                match outcome {
                    SimulationOutcome::TimedOut => error!(
                        "Timeout ({:.1}s). Simulation requirements were not satisfied on time.",
                        secs
                    ),
                    SimulationOutcome::BreakpointHit => error!(
                        "A simulation breakpoint was satisfied at {:.1}s. Terminating.",
                        secs
                    ),
                    SimulationOutcome::AllSatisfied => info!(
                        "All requirements satisfied. Simulation concluded with success on {:.1}s.",
                        secs
                    ),
                }
                state.elapsed = elapsed;
                state.advance(RunPhase::Finished);
                return outcome;
            }

            self.ctx.sleep(self.options.poll_interval).await;
        }
    }

    /// Best-effort removal of everything the run created.
    async fn tear_down(&self, state: &mut RunState) -> Vec<String> {
        let mut failures = Vec::new();

        state.aggregator.close_all().await;

        for name in &state.started {
            match self.runtime.remove_container(name).await {
                Ok(()) => info!("Removed Docker container '{}'", name),
                Err(e) => {
                    error!("Failed to remove container '{}': {}", name, e);
                    failures.push(e.to_string());
                }
            }
        }

        if state.network_created {
            match self.runtime.remove_network(&state.network).await {
                Ok(()) => info!("Removed Docker network '{}'.", state.network),
                Err(e) => {
                    error!("Failed to remove network '{}': {}", state.network, e);
                    failures.push(e.to_string());
                }
            }
        }

        state.advance(RunPhase::TornDown);
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::tests::{ChannelBus, ChannelConnection};
    use async_trait::async_trait;
    use rigel_env::{ContainerHandle, ContainerSpec, TokioContext};
    use std::sync::Mutex;

    /// Runtime that records calls and can fail the network, one launch or
    /// one status wait.
    #[derive(Default)]
    struct RecordingRuntime {
        fail_on: Option<String>,
        fail_wait: Option<String>,
        fail_network: bool,
        specs: Mutex<Vec<ContainerSpec>>,
        removed: Mutex<Vec<String>>,
        networks_removed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContainerRuntime for RecordingRuntime {
        async fn create_network(&self, name: &str, _driver: &str) -> Result<(), RuntimeError> {
            if self.fail_network {
                return Err(RuntimeError::network(name, "driver unavailable"));
            }
            Ok(())
        }

        async fn remove_network(&self, name: &str) -> Result<(), RuntimeError> {
            self.networks_removed.lock().unwrap().push(name.to_string());
            Ok(())
        }

        async fn run_container(
            &self,
            spec: &ContainerSpec,
        ) -> Result<ContainerHandle, RuntimeError> {
            if self.fail_on.as_deref() == Some(spec.name.as_str()) {
                return Err(RuntimeError::container(&spec.name, "image not found"));
            }
            self.specs.lock().unwrap().push(spec.clone());
            Ok(ContainerHandle {
                name: spec.name.clone(),
                id: format!("id-{}", spec.name),
            })
        }

        async fn wait_for_status(
            &self,
            name: &str,
            status: ContainerStatus,
        ) -> Result<(), RuntimeError> {
            if self.fail_wait.as_deref() == Some(name) {
                return Err(RuntimeError::StatusTimeout {
                    name: name.to_string(),
                    status: status.to_string(),
                });
            }
            Ok(())
        }

        async fn container_address(
            &self,
            _name: &str,
            _network: &str,
        ) -> Result<IpAddr, RuntimeError> {
            Ok(IpAddr::from([10, 0, 0, 2]))
        }

        async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
            self.removed.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    fn bus() -> Arc<ChannelBus> {
        Arc::new(ChannelBus {
            connection: Arc::new(ChannelConnection::default()),
            reachable: true,
        })
    }

    #[test]
    fn test_decide_priority() {
        assert_eq!(SimulationOutcome::decide(false, false, false), None);
        assert_eq!(
            SimulationOutcome::decide(true, true, true),
            Some(SimulationOutcome::TimedOut)
        );
        assert_eq!(
            SimulationOutcome::decide(false, true, true),
            Some(SimulationOutcome::BreakpointHit)
        );
        assert_eq!(
            SimulationOutcome::decide(false, false, true),
            Some(SimulationOutcome::AllSatisfied)
        );
    }

    #[test]
    fn test_network_name_is_run_unique() {
        let a = network_name(&Uuid::new_v4());
        let b = network_name(&Uuid::new_v4());
        assert!(a.starts_with("rigel-simulation-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_node_environment() {
        let env = node_environment(IpAddr::from([172, 28, 0, 2]), "robot");
        assert_eq!(env[0], "ROS_MASTER_URI=http://172.28.0.2:11311");
        assert_eq!(env[1], "ROS_HOSTNAME=robot");
    }

    #[tokio::test]
    async fn test_unobserved_run_times_out() {
        let runtime = Arc::new(RecordingRuntime::default());
        let config =
            SimulationConfig::new("noetic", vec![ContainerDescriptor::new("world", "gazebo")]);
        let orchestrator =
            SimulationOrchestrator::new(TokioContext::shared(), runtime.clone(), bus(), config)
                .unwrap()
                .with_options(
                    OrchestratorOptions::default()
                        .with_timeout(Duration::from_millis(30))
                        .with_poll_interval(Duration::from_millis(5)),
                );

        let result = orchestrator.run().await.unwrap();
        assert_eq!(result.outcome, SimulationOutcome::TimedOut);
        assert!(result.report.is_empty());
        assert!(!result.passed());

        let specs = runtime.specs.lock().unwrap();
        assert_eq!(specs[0].name, "master");
        assert_eq!(specs[0].image, "ros:noetic");
        assert_eq!(specs[0].command.as_deref(), Some("roscore"));
        let master_address = IpAddr::from([10, 0, 0, 2]);
        assert_eq!(specs[1].env, node_environment(master_address, "world").to_vec());
        assert_eq!(
            runtime.networks_removed.lock().unwrap().as_slice(),
            &[result.network.clone()]
        );
    }

    #[tokio::test]
    async fn test_start_failure_tears_down_started_containers() {
        let runtime = Arc::new(RecordingRuntime {
            fail_on: Some("b".to_string()),
            ..Default::default()
        });
        let config = SimulationConfig::new(
            "noetic",
            vec![
                ContainerDescriptor::new("a", "img"),
                ContainerDescriptor::new("b", "img"),
                ContainerDescriptor::new("c", "img"),
            ],
        );
        let result = run_failing(&runtime, config).await;
        assert!(matches!(result, Err(OrchestratorError::Infrastructure { .. })));

        let mut removed = runtime.removed.lock().unwrap().clone();
        removed.sort();
        assert_eq!(removed, vec!["a".to_string(), "master".to_string()]);
        assert_eq!(runtime.networks_removed.lock().unwrap().len(), 1);
    }

    async fn run_failing(
        runtime: &Arc<RecordingRuntime>,
        config: SimulationConfig,
    ) -> Result<RunReport, OrchestratorError> {
        let ctx = TokioContext::shared();
        let orchestrator =
            SimulationOrchestrator::new(ctx, Arc::clone(runtime), bus(), config).unwrap();
        orchestrator.run().await
    }

    #[tokio::test]
    async fn test_network_failure_touches_nothing() {
        let runtime = Arc::new(RecordingRuntime {
            fail_network: true,
            ..Default::default()
        });
        let config = SimulationConfig::new("noetic", vec![ContainerDescriptor::new("a", "img")]);

        let result = run_failing(&runtime, config).await;
        match result {
            Err(OrchestratorError::Infrastructure {
                source,
                teardown_errors,
            }) => {
                assert!(matches!(source, RuntimeError::Network { .. }));
                assert!(teardown_errors.is_empty());
            }
            other => panic!("expected infrastructure failure, got {:?}", other.map(|r| r.outcome)),
        }

        assert!(runtime.specs.lock().unwrap().is_empty());
        assert!(runtime.removed.lock().unwrap().is_empty());
        // Never created, so never removed
        assert!(runtime.networks_removed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_wait_failure_removes_launched_container() {
        let runtime = Arc::new(RecordingRuntime {
            fail_wait: Some("master".to_string()),
            ..Default::default()
        });
        let config = SimulationConfig::new("noetic", vec![ContainerDescriptor::new("a", "img")]);

        let result = run_failing(&runtime, config).await;
        assert!(matches!(
            result,
            Err(OrchestratorError::Infrastructure {
                source: RuntimeError::StatusTimeout { .. },
                ..
            })
        ));

        // The master was launched before its wait failed; "a" never was
        assert_eq!(runtime.specs.lock().unwrap().len(), 1);
        assert_eq!(runtime.removed.lock().unwrap().as_slice(), &["master".to_string()]);
        assert_eq!(runtime.networks_removed.lock().unwrap().len(), 1);
    }
}
