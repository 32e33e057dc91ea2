//! Simulated container runtime with fault injection.

use async_trait::async_trait;
use rigel_env::{ContainerHandle, ContainerRuntime, ContainerSpec, ContainerStatus, RuntimeError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;

/// Faults injected into the runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeFaults {
    /// Containers whose launch fails
    #[serde(default)]
    pub fail_start: Vec<String>,

    /// Containers that never reach "running"
    #[serde(default)]
    pub fail_wait: Vec<String>,

    /// Containers whose removal fails
    #[serde(default)]
    pub fail_remove: Vec<String>,

    /// Network creation fails
    #[serde(default)]
    pub fail_network: bool,
}

/// One recorded runtime call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "name", rename_all = "snake_case")]
pub enum RuntimeEvent {
    NetworkCreated(String),
    ContainerStarted(String),
    ContainerRemoved(String),
    RemovalFailed(String),
    NetworkRemoved(String),
}

/// A container known to the simulated runtime.
#[derive(Debug, Clone)]
pub struct SimContainer {
    pub spec: ContainerSpec,
    pub status: ContainerStatus,
    pub address: IpAddr,
}

#[derive(Default)]
struct RuntimeState {
    networks: HashSet<String>,
    containers: HashMap<String, SimContainer>,
    next_host: u8,
    journal: Vec<RuntimeEvent>,
}

/// In-memory container runtime.
///
/// Containers get addresses `172.28.0.2`, `172.28.0.3`, ... in launch order
/// and are "running" as soon as they are launched.
pub struct SimContainerRuntime {
    faults: RuntimeFaults,
    state: Mutex<RuntimeState>,
}

impl SimContainerRuntime {
    /// Creates a fault-free runtime.
    pub fn new() -> Self {
        Self::with_faults(RuntimeFaults::default())
    }

    pub fn with_faults(faults: RuntimeFaults) -> Self {
        Self {
            faults,
            state: Mutex::new(RuntimeState {
                next_host: 2,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Recorded calls, in order.
    pub fn journal(&self) -> Vec<RuntimeEvent> {
        self.state().journal.clone()
    }

    /// Names of containers that still exist.
    pub fn live_containers(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state().containers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn live_networks(&self) -> Vec<String> {
        self.state().networks.iter().cloned().collect()
    }

    /// Looks up a running container by address.
    pub fn running_at(&self, address: IpAddr) -> Option<String> {
        self.state()
            .containers
            .values()
            .find(|c| c.address == address && c.status == ContainerStatus::Running)
            .map(|c| c.spec.name.clone())
    }

    fn is_faulty(list: &[String], name: &str) -> bool {
        list.iter().any(|n| n == name)
    }
}

impl Default for SimContainerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for SimContainerRuntime {
    async fn create_network(&self, name: &str, driver: &str) -> Result<(), RuntimeError> {
        if self.faults.fail_network {
            return Err(RuntimeError::network(name, format!("driver '{}' unavailable", driver)));
        }
        let mut state = self.state();
        if !state.networks.insert(name.to_string()) {
            return Err(RuntimeError::network(name, "already exists"));
        }
        state.journal.push(RuntimeEvent::NetworkCreated(name.to_string()));
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.state();
        if !state.networks.remove(name) {
            return Err(RuntimeError::network(name, "not found"));
        }
        state.journal.push(RuntimeEvent::NetworkRemoved(name.to_string()));
        Ok(())
    }

    async fn run_container(&self, spec: &ContainerSpec) -> Result<ContainerHandle, RuntimeError> {
        if Self::is_faulty(&self.faults.fail_start, &spec.name) {
            return Err(RuntimeError::container(&spec.name, "failed to start"));
        }

        let mut state = self.state();
        if !state.networks.contains(&spec.network) {
            return Err(RuntimeError::network(&spec.network, "not found"));
        }
        if state.containers.contains_key(&spec.name) {
            return Err(RuntimeError::container(&spec.name, "name already in use"));
        }

        let address = IpAddr::V4(Ipv4Addr::new(172, 28, 0, state.next_host));
        state.next_host = state.next_host.wrapping_add(1);

        let status = if Self::is_faulty(&self.faults.fail_wait, &spec.name) {
            ContainerStatus::Exited
        } else {
            ContainerStatus::Running
        };
        state.containers.insert(
            spec.name.clone(),
            SimContainer {
                spec: spec.clone(),
                status,
                address,
            },
        );
        state.journal.push(RuntimeEvent::ContainerStarted(spec.name.clone()));

        Ok(ContainerHandle {
            name: spec.name.clone(),
            id: format!("sim-{:04}", state.journal.len()),
        })
    }

    async fn wait_for_status(
        &self,
        name: &str,
        status: ContainerStatus,
    ) -> Result<(), RuntimeError> {
        let state = self.state();
        let container = state
            .containers
            .get(name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        if container.status == status {
            Ok(())
        } else {
            Err(RuntimeError::StatusTimeout {
                name: name.to_string(),
                status: status.to_string(),
            })
        }
    }

    async fn container_address(&self, name: &str, network: &str) -> Result<IpAddr, RuntimeError> {
        let state = self.state();
        let container = state
            .containers
            .get(name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        if container.spec.network != network {
            return Err(RuntimeError::NoAddress {
                name: name.to_string(),
                network: network.to_string(),
            });
        }
        Ok(container.address)
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.state();
        if Self::is_faulty(&self.faults.fail_remove, name) {
            state.journal.push(RuntimeEvent::RemovalFailed(name.to_string()));
            return Err(RuntimeError::container(name, "removal refused"));
        }
        if state.containers.remove(name).is_none() {
            return Err(RuntimeError::NotFound(name.to_string()));
        }
        state.journal.push(RuntimeEvent::ContainerRemoved(name.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: "img".to_string(),
            hostname: name.to_string(),
            network: "net".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let runtime = SimContainerRuntime::new();
        runtime.create_network("net", "bridge").await.unwrap();
        runtime.run_container(&spec("master")).await.unwrap();
        runtime.run_container(&spec("robot")).await.unwrap();

        runtime.wait_for_status("robot", ContainerStatus::Running).await.unwrap();
        let addr = runtime.container_address("robot", "net").await.unwrap();
        assert_eq!(addr, IpAddr::from([172, 28, 0, 3]));
        assert_eq!(runtime.running_at(addr).as_deref(), Some("robot"));

        runtime.remove_container("robot").await.unwrap();
        runtime.remove_container("master").await.unwrap();
        runtime.remove_network("net").await.unwrap();

        assert!(runtime.live_containers().is_empty());
        assert!(runtime.live_networks().is_empty());
        assert_eq!(runtime.journal().len(), 6);
    }

    #[tokio::test]
    async fn test_requires_network() {
        let runtime = SimContainerRuntime::new();
        assert!(runtime.run_container(&spec("robot")).await.is_err());
    }

    #[tokio::test]
    async fn test_faults() {
        let runtime = SimContainerRuntime::with_faults(RuntimeFaults {
            fail_start: vec!["bad".to_string()],
            fail_wait: vec!["slow".to_string()],
            fail_remove: vec!["sticky".to_string()],
            fail_network: false,
        });
        runtime.create_network("net", "bridge").await.unwrap();

        assert!(runtime.run_container(&spec("bad")).await.is_err());

        runtime.run_container(&spec("slow")).await.unwrap();
        assert!(matches!(
            runtime.wait_for_status("slow", ContainerStatus::Running).await,
            Err(RuntimeError::StatusTimeout { .. })
        ));

        runtime.run_container(&spec("sticky")).await.unwrap();
        assert!(runtime.remove_container("sticky").await.is_err());
        assert!(runtime.journal().contains(&RuntimeEvent::RemovalFailed("sticky".to_string())));
    }

    #[tokio::test]
    async fn test_network_fault() {
        let runtime = SimContainerRuntime::with_faults(RuntimeFaults {
            fail_network: true,
            ..Default::default()
        });
        assert!(matches!(
            runtime.create_network("net", "bridge").await,
            Err(RuntimeError::Network { .. })
        ));
    }
}
