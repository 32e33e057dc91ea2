//! Run-time status of one requirement.
//!
//! Each [`RequirementStatus`] has exactly one writer, its listener task, which
//! owns the subscription and publishes `(call_count, satisfied)` through a
//! watch channel. Readers (the aggregator, the monitoring loop) only ever see
//! whole snapshots, so `satisfied == true` is never visible before the
//! satisfying message has been counted.

use crate::error::EvaluationError;
use crate::evaluator::{evaluate, extract_field};
use crate::requirement::Requirement;
use rigel_env::{BusConnection, Message, RunContext, Subscription, SubscriptionId};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Atomically published status pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Messages received on the topic, matching or not
    pub call_count: u64,
    /// Sticky: never reverts once true
    pub satisfied: bool,
}

/// What one delivery did to a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Requirement was already satisfied; only the count moved
    AlreadySatisfied,
    /// This message satisfied the requirement
    Matched,
    NotMatched,
    /// Message could not be evaluated; counted, treated as non-matching
    Rejected(EvaluationError),
}

impl StatusSnapshot {
    /// Applies one delivered message.
    pub fn observe(&mut self, requirement: &Requirement, message: &Message) -> Observation {
        self.call_count += 1;

        if self.satisfied {
            return Observation::AlreadySatisfied;
        }

        let extracted = match requirement.field() {
            Some(path) if requirement.condition().needs_field() => {
                match extract_field(message, path) {
                    Ok(value) => Some(value),
                    Err(e) => return Observation::Rejected(e),
                }
            }
            _ => None,
        };

        match evaluate(
            requirement.condition(),
            extracted,
            requirement.value(),
            self.call_count,
        ) {
            Ok(true) => {
                self.satisfied = true;
                Observation::Matched
            }
            Ok(false) => Observation::NotMatched,
            Err(e) => Observation::Rejected(e),
        }
    }
}

/// A requirement paired with its live status.
pub struct RequirementStatus {
    requirement: Arc<Requirement>,
    snapshot: watch::Receiver<StatusSnapshot>,
    subscription: Option<SubscriptionId>,
}

impl RequirementStatus {
    /// Creates a status that will never be fed (its container is unobserved).
    pub fn detached(requirement: Arc<Requirement>) -> Self {
        let (_, snapshot) = watch::channel(StatusSnapshot::default());
        Self {
            requirement,
            snapshot,
            subscription: None,
        }
    }

    /// Creates a status fed by `subscription` and spawns its listener.
    pub fn attach<Ctx: RunContext>(
        ctx: &Ctx,
        requirement: Arc<Requirement>,
        subscription: Subscription,
        connection: Arc<dyn BusConnection>,
    ) -> Self {
        let (publisher, snapshot) = watch::channel(StatusSnapshot::default());
        let id = subscription.id;

        let listener = RequirementListener {
            requirement: Arc::clone(&requirement),
            subscription,
            connection,
            publisher,
        };
        ctx.spawn(&format!("listener:{}:{}", requirement.topic(), id), listener.run());

        Self {
            requirement,
            snapshot,
            subscription: Some(id),
        }
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Subscription feeding this status, if any.
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    /// Returns the latest published snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        *self.snapshot.borrow()
    }

    pub fn is_satisfied(&self) -> bool {
        self.snapshot().satisfied
    }

    pub fn call_count(&self) -> u64 {
        self.snapshot().call_count
    }

    pub fn is_breakpoint(&self) -> bool {
        self.requirement.is_breakpoint()
    }
}

/// Writer half: drains one subscription and publishes snapshots.
struct RequirementListener {
    requirement: Arc<Requirement>,
    subscription: Subscription,
    connection: Arc<dyn BusConnection>,
    publisher: watch::Sender<StatusSnapshot>,
}

impl RequirementListener {
    async fn run(mut self) {
        while let Some(message) = self.subscription.messages.recv().await {
            let mut observation = Observation::AlreadySatisfied;
            self.publisher.send_modify(|snapshot| {
                observation = snapshot.observe(&self.requirement, &message);
            });

            match observation {
                Observation::Matched => {
                    info!("Requirement satisfied: {}", self.requirement);
                    if let Err(e) = self.connection.unsubscribe(self.subscription.id).await {
                        warn!("Failed to release {}: {}", self.subscription.id, e);
                    }
                    break;
                }
                Observation::AlreadySatisfied => break,
                Observation::NotMatched => {}
                Observation::Rejected(e) => {
                    debug!("Skipping message on {}: {}", self.requirement.topic(), e);
                }
            }
        }
    }
}
