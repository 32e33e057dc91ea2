//! Rigel Deterministic Simulation Harness
//!
//! Runs the real `SimulationOrchestrator` against simulated collaborators so
//! a whole run (network, master, nodes, bridge traffic, teardown) completes in
//! milliseconds and gives the same verdict for the same seed.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: Virtual clock advances only when the monitoring loop sleeps
//! - **Containers**: In-memory runtime with injectable start/removal faults
//! - **Traffic**: Scripted per-topic feeds with seeded delivery jitter
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ScenarioRunner                       │
//! │   RunPlan ──► SimulationOrchestrator<SimContext, ...>    │
//! │                  │                    │                  │
//! │       ┌──────────▼─────────┐  ┌───────▼────────┐         │
//! │       │ SimContainerRuntime│◄─┤ SimMessageBus  │         │
//! │       │ (addresses, faults)│  │ (feeds, jitter)│         │
//! │       └────────────────────┘  └────────────────┘         │
//! │                  ▲ virtual clock (SimContext)            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rigel_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::EqualsDone).await;
//! assert!(result.passed);
//! println!("{}", result.report);
//! ```

mod bus;
mod context;
mod exporter;
mod plan;
mod runner;
mod runtime;
pub mod scenarios;

pub use bus::{BusFaults, BusJournal, Feed, FeedMessage, SimMessageBus};
pub use context::SimContext;
pub use exporter::RunExport;
pub use plan::{Expectation, Faults, RunPlan};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use runtime::{RuntimeEvent, RuntimeFaults, SimContainer, SimContainerRuntime};
pub use scenarios::ScenarioId;
