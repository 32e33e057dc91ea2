//! Container runtime abstraction.

use crate::error::RuntimeError;
use crate::types::{ContainerHandle, ContainerSpec, ContainerStatus};
use async_trait::async_trait;
use std::net::IpAddr;

/// Abstraction over the container engine hosting a simulation.
///
/// # Implementations
///
/// - **Production**: a Docker client
/// - **Simulation**: `SimContainerRuntime` with fault injection
///
/// Calls are issued sequentially by the orchestrator; implementations need
/// no internal concurrency.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Creates an isolated network with the given driver.
    async fn create_network(&self, name: &str, driver: &str) -> Result<(), RuntimeError>;

    /// Removes a network created by [`create_network`](Self::create_network).
    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError>;

    /// Creates and starts a detached container.
    async fn run_container(&self, spec: &ContainerSpec) -> Result<ContainerHandle, RuntimeError>;

    /// Blocks until the container reaches `status`.
    ///
    /// # Returns
    /// * `Err(RuntimeError::StatusTimeout)` - the status was not reached within
    ///   the implementation's own bound
    async fn wait_for_status(&self, name: &str, status: ContainerStatus)
        -> Result<(), RuntimeError>;

    /// Resolves the container's address on the given network.
    async fn container_address(&self, name: &str, network: &str) -> Result<IpAddr, RuntimeError>;

    /// Stops and removes the container.
    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError>;
}
