//! Common types shared by the collaborator contracts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// A decoded bus message.
///
/// Bridges deliver messages as JSON documents, so requirements address
/// fields through dotted paths into this value.
pub type Message = serde_json::Value;

/// Identifier of a live subscription on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A subscription handle: its id plus the stream of decoded messages.
///
/// The stream ends when the subscription is released or the connection
/// closes.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub messages: mpsc::Receiver<Message>,
}

/// Container lifecycle status as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Running,
    Exited,
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContainerStatus::Created => "created",
            ContainerStatus::Running => "running",
            ContainerStatus::Exited => "exited",
        };
        f.write_str(name)
    }
}

/// Everything the runtime needs to launch one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Option<String>,
    pub env: Vec<String>,
    pub hostname: String,
    pub network: String,
    pub ports: BTreeMap<String, Option<u16>>,
    pub privileged: bool,
    pub volumes: Vec<String>,
}

/// Opaque handle returned by the runtime for a launched container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub name: String,
    pub id: String,
}
