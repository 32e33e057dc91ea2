//! Error types for the collaborator contracts.

use thiserror::Error;

/// Errors raised by a [`ContainerRuntime`](crate::ContainerRuntime).
///
/// Any of these during bring-up is fatal to the run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Network create/remove failed
    #[error("Network '{name}' error: {reason}")]
    Network { name: String, reason: String },

    /// Container create/start/remove failed
    #[error("Container '{name}' error: {reason}")]
    Container { name: String, reason: String },

    /// Container did not reach the requested status in time
    #[error("Container '{name}' did not reach status '{status}'")]
    StatusTimeout { name: String, status: String },

    /// Container has no address on the requested network
    #[error("Container '{name}' has no address on network '{network}'")]
    NoAddress { name: String, network: String },

    /// Container is not known to the runtime
    #[error("Container '{0}' not found")]
    NotFound(String),
}

impl RuntimeError {
    /// Creates a network error.
    pub fn network(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a container error.
    pub fn container(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Container {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by a [`MessageBus`](crate::MessageBus) or
/// [`BusConnection`](crate::BusConnection).
///
/// These never abort a run: the affected requirements stay unsatisfied.
#[derive(Debug, Error)]
pub enum BusError {
    /// Endpoint could not be reached
    #[error("Cannot connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// Connect did not complete within the bound
    #[error("Connect to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// Subscription was refused
    #[error("Cannot subscribe to '{topic}' ({message_type}): {reason}")]
    Subscribe {
        topic: String,
        message_type: String,
        reason: String,
    },

    /// Connection already closed
    #[error("Connection closed")]
    Closed,
}

impl BusError {
    /// Creates a connect error.
    pub fn connect(endpoint: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::Connect {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }
}
