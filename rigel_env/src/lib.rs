//! Rigel Environment Abstraction Layer
//!
//! This crate defines the narrow contracts the simulation oracle uses to reach
//! the outside world, so the orchestration engine can run against real
//! infrastructure or against the in-memory doubles in `rigel_sim`.
//!
//! # Collaborators
//!
//! - **Clock & tasks**: [`RunContext`] (`now()`, `sleep()`, `spawn()`)
//! - **Containers**: [`ContainerRuntime`] (networks, containers, addresses)
//! - **Message bus**: [`MessageBus`] / [`BusConnection`] (connect, subscribe,
//!   unsubscribe, close)
//!
//! # Example
//!
//! ```ignore
//! use rigel_env::{BusConnection, MessageBus, RunContext};
//!
//! async fn watch<Ctx: RunContext, Bus: MessageBus>(ctx: &Ctx, bus: &Bus, addr: IpAddr) {
//!     let conn = bus.connect(addr, 9090, Duration::from_secs(60)).await?;
//!     let mut sub = conn.subscribe("/odom", "nav_msgs/Odometry").await?;
//!     while let Some(message) = sub.messages.recv().await {
//!         handle(message);
//!     }
//! }
//! ```

mod bus;
mod container;
mod context;
mod error;
mod tokio_impl;
mod types;

pub use bus::{BusConnection, MessageBus};
pub use container::ContainerRuntime;
pub use context::RunContext;
pub use error::{BusError, RuntimeError};
pub use tokio_impl::TokioContext;
pub use types::{
    ContainerHandle, ContainerSpec, ContainerStatus, Message, Subscription, SubscriptionId,
};
