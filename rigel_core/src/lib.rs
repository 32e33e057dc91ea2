//! Rigel Core - Requirement Evaluation & Simulation Lifecycle Engine
//!
//! Decides, without supervision, how a containerized ROS simulation ended:
//! 1. **All satisfied**: every declared requirement held on its topic
//! 2. **Breakpoint hit**: an undesired condition fired first
//! 3. **Timed out**: the deadline expired first
//!
//! ```text
//! SimulationOrchestrator
//!   └─ BridgeConnection (one per observed container)
//!        └─ RequirementStatus (one per requirement) ◄── evaluate() ◄── messages
//!   ◄─ RequirementsAggregator (all_satisfied / any_breakpoint_satisfied / report)
//! ```

pub mod aggregator;
pub mod bridge;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod orchestrator;
pub mod requirement;
pub mod status;

// Re-export key types for convenience
pub use aggregator::{Report, ReportEntry, RequirementsAggregator};
pub use bridge::BridgeConnection;
pub use config::{ContainerDescriptor, SimulationConfig};
pub use error::{ConfigurationError, EvaluationError, OrchestratorError};
pub use evaluator::{evaluate, extract_field};
pub use orchestrator::{OrchestratorOptions, RunReport, SimulationOrchestrator, SimulationOutcome};
pub use requirement::{Condition, Requirement};
pub use status::{Observation, RequirementStatus, StatusSnapshot};
