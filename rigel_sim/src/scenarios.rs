//! Built-in simulation scenarios.

use crate::bus::{BusFaults, Feed, FeedMessage};
use crate::plan::{Expectation, Faults, RunPlan};
use crate::runtime::RuntimeFaults;
use rigel_core::{
    Condition, ConfigurationError, ContainerDescriptor, Requirement, SimulationConfig,
    SimulationOutcome,
};
use serde_json::{json, Value};

const DISTRO: &str = "noetic";
const TIMEOUT_SECS: u64 = 5;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// A state topic reaches "done" before the deadline
    EqualsDone,

    /// The state topic never reaches "done"
    Timeout,

    /// A single breakpoint fires on the first message
    Breakpoint,

    /// A breakpoint fires before the success condition
    BreakpointWins,

    /// The second of three containers fails to start
    StartupFailure,

    /// No container declares requirements
    Unobserved,

    /// The only observed container's bridge refuses connections
    UnreachableBridge,

    /// A container refuses removal during teardown
    RemovalFailure,

    /// The run network cannot be created
    NetworkFailure,

    /// The master is launched but never reaches "running"
    MasterExits,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::EqualsDone,
            ScenarioId::Timeout,
            ScenarioId::Breakpoint,
            ScenarioId::BreakpointWins,
            ScenarioId::StartupFailure,
            ScenarioId::Unobserved,
            ScenarioId::UnreachableBridge,
            ScenarioId::RemovalFailure,
            ScenarioId::NetworkFailure,
            ScenarioId::MasterExits,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::EqualsDone => "equals_done",
            ScenarioId::Timeout => "timeout",
            ScenarioId::Breakpoint => "breakpoint",
            ScenarioId::BreakpointWins => "breakpoint_wins",
            ScenarioId::StartupFailure => "startup_failure",
            ScenarioId::Unobserved => "unobserved",
            ScenarioId::UnreachableBridge => "unreachable_bridge",
            ScenarioId::RemovalFailure => "removal_failure",
            ScenarioId::NetworkFailure => "network_failure",
            ScenarioId::MasterExits => "master_exits",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::EqualsDone => "EQUALS on /state: \"running\" then \"done\", all satisfied",
            ScenarioId::Timeout => "EQUALS on /state never holds, times out after 5s",
            ScenarioId::Breakpoint => "RECEIVED_COUNT 1 breakpoint on /crash, no other requirement",
            ScenarioId::BreakpointWins => "crash at 300ms preempts \"done\" at 2s",
            ScenarioId::StartupFailure => "container b fails to start, master and a torn down",
            ScenarioId::Unobserved => "no introspection, vacuous failure until timeout",
            ScenarioId::UnreachableBridge => "bridge refuses connection, FAILURE line at timeout",
            ScenarioId::RemovalFailure => {
                "container refuses removal, teardown reports and continues"
            }
            ScenarioId::NetworkFailure => "network creation fails, nothing launched or removed",
            ScenarioId::MasterExits => "master exits before running, master and network removed",
        }
    }

    /// Verdict a correct orchestrator reaches on this scenario.
    pub fn expected(&self) -> Expectation {
        match self {
            ScenarioId::EqualsDone | ScenarioId::RemovalFailure => {
                Expectation::Outcome(SimulationOutcome::AllSatisfied)
            }
            ScenarioId::Timeout | ScenarioId::Unobserved | ScenarioId::UnreachableBridge => {
                Expectation::Outcome(SimulationOutcome::TimedOut)
            }
            ScenarioId::Breakpoint | ScenarioId::BreakpointWins => {
                Expectation::Outcome(SimulationOutcome::BreakpointHit)
            }
            ScenarioId::StartupFailure | ScenarioId::NetworkFailure | ScenarioId::MasterExits => {
                Expectation::InfrastructureFailure
            }
        }
    }

    /// Builds the run plan of this scenario.
    pub fn plan(&self) -> Result<RunPlan, ConfigurationError> {
        let plan = match self {
            ScenarioId::EqualsDone => RunPlan::new(config(vec![robot(vec![state_done()?])]))
                .with_feed(state_feed(&[(100, "running"), (200, "done")])),

            ScenarioId::Timeout => RunPlan::new(config(vec![robot(vec![state_done()?])]))
                .with_feed(state_feed(&[(100, "running"), (1_000, "stuck")])),

            ScenarioId::Breakpoint => {
                RunPlan::new(config(vec![robot(vec![crash_breakpoint()?])]))
                    .with_feed(crash_feed(300))
            }

            ScenarioId::BreakpointWins => {
                RunPlan::new(config(vec![robot(vec![state_done()?, crash_breakpoint()?])]))
                    .with_feed(crash_feed(300))
                    .with_feed(state_feed(&[(2_000, "done")]))
            }

            ScenarioId::StartupFailure => RunPlan::new(config(vec![
                ContainerDescriptor::new("a", "ros:noetic"),
                ContainerDescriptor::new("b", "ros:noetic"),
                ContainerDescriptor::new("c", "ros:noetic"),
            ]))
            .with_faults(Faults {
                runtime: RuntimeFaults {
                    fail_start: vec!["b".to_string()],
                    ..Default::default()
                },
                ..Default::default()
            }),

            ScenarioId::Unobserved => RunPlan::new(config(vec![
                ContainerDescriptor::new("driver", "driver:latest"),
                ContainerDescriptor::new("planner", "planner:latest"),
            ])),

            ScenarioId::UnreachableBridge => {
                RunPlan::new(config(vec![robot(vec![state_done()?])]))
                    .with_feed(state_feed(&[(100, "done")]))
                    .with_faults(Faults {
                        bus: BusFaults {
                            unreachable: vec!["robot".to_string()],
                            ..Default::default()
                        },
                        ..Default::default()
                    })
            }

            ScenarioId::RemovalFailure => RunPlan::new(config(vec![
                robot(vec![state_done()?]),
                ContainerDescriptor::new("sensor", "sensor:latest"),
            ]))
            .with_feed(state_feed(&[(100, "done")]))
            .with_faults(Faults {
                runtime: RuntimeFaults {
                    fail_remove: vec!["robot".to_string()],
                    ..Default::default()
                },
                ..Default::default()
            }),

            ScenarioId::NetworkFailure => RunPlan::new(config(vec![robot(vec![state_done()?])]))
                .with_faults(Faults {
                    runtime: RuntimeFaults {
                        fail_network: true,
                        ..Default::default()
                    },
                    ..Default::default()
                }),

            ScenarioId::MasterExits => RunPlan::new(config(vec![robot(vec![state_done()?])]))
                .with_feed(state_feed(&[(100, "done")]))
                .with_faults(Faults {
                    runtime: RuntimeFaults {
                        fail_wait: vec!["master".to_string()],
                        ..Default::default()
                    },
                    ..Default::default()
                }),
        };
        Ok(plan.expecting(self.expected()))
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScenarioId::all()
            .into_iter()
            .find(|id| id.name() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown scenario: {}", s))
    }
}

fn config(packages: Vec<ContainerDescriptor>) -> SimulationConfig {
    SimulationConfig::new(DISTRO, packages).with_timeout(TIMEOUT_SECS)
}

fn robot(requirements: Vec<Requirement>) -> ContainerDescriptor {
    requirements.into_iter().fold(
        ContainerDescriptor::new("robot", "robot:latest")
            .with_command("roslaunch robot sim.launch"),
        ContainerDescriptor::with_requirement,
    )
}

fn state_done() -> Result<Requirement, ConfigurationError> {
    Requirement::new(
        Condition::Equals,
        "/state",
        "std_msgs/String",
        Some("state".to_string()),
        json!("done"),
    )
}

fn crash_breakpoint() -> Result<Requirement, ConfigurationError> {
    Ok(Requirement::new(Condition::ReceivedCount, "/crash", "std_msgs/Empty", None, json!(1))?
        .breakpoint(true))
}

fn state_feed(states: &[(u64, &str)]) -> Feed {
    Feed {
        container: "robot".to_string(),
        topic: "/state".to_string(),
        messages: states
            .iter()
            .map(|(at, state)| FeedMessage::new(*at, json!({ "state": state })))
            .collect(),
    }
}

fn crash_feed(at_ms: u64) -> Feed {
    Feed {
        container: "robot".to_string(),
        topic: "/crash".to_string(),
        messages: vec![FeedMessage::new(at_ms, Value::Object(Default::default()))],
    }
}
