//! Bridge connections - one bus connection per observed container.

use crate::requirement::Requirement;
use crate::status::RequirementStatus;
use rigel_env::{BusConnection, BusError, MessageBus, RunContext};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The bus connection to one running container and the statuses fed by it.
///
/// A bridge without a live connection is "unobserved": its statuses exist so
/// they appear in the report, but they can never become satisfied.
pub struct BridgeConnection {
    container: String,
    endpoint: SocketAddr,
    connection: Option<Arc<dyn BusConnection>>,
    statuses: Vec<RequirementStatus>,
}

impl BridgeConnection {
    /// Connects to the container's bus endpoint.
    pub async fn open<B: MessageBus + ?Sized>(
        bus: &B,
        container: &str,
        address: IpAddr,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Self, BusError> {
        let connection = bus.connect(address, port, connect_timeout).await?;
        let endpoint = SocketAddr::new(address, port);
        info!("\t- Connected to bus bridge of '{}' at {}", container, endpoint);

        Ok(Self {
            container: container.to_string(),
            endpoint,
            connection: Some(connection),
            statuses: Vec::new(),
        })
    }

    /// Creates a bridge whose container could not be reached.
    pub fn unobserved(container: &str, address: IpAddr, port: u16) -> Self {
        Self {
            container: container.to_string(),
            endpoint: SocketAddr::new(address, port),
            connection: None,
            statuses: Vec::new(),
        }
    }

    /// Subscribes a requirement and registers its status.
    ///
    /// A refused subscription still registers an (unfed) status.
    pub async fn register<Ctx: RunContext>(&mut self, ctx: &Ctx, requirement: Arc<Requirement>) {
        let status = match &self.connection {
            Some(connection) => {
                match connection
                    .subscribe(requirement.topic(), requirement.message_type())
                    .await
                {
                    Ok(subscription) => RequirementStatus::attach(
                        ctx,
                        Arc::clone(&requirement),
                        subscription,
                        Arc::clone(connection),
                    ),
                    Err(e) => {
                        warn!("'{}' at {}: {}", self.container, self.endpoint, e);
                        RequirementStatus::detached(requirement)
                    }
                }
            }
            None => RequirementStatus::detached(requirement),
        };
        self.statuses.push(status);
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Statuses in registration order.
    pub fn statuses(&self) -> &[RequirementStatus] {
        &self.statuses
    }

    /// Closes the connection, ending every listener still running.
    pub async fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close().await;
            info!("Closed bus bridge of '{}' at {}", self.container, self.endpoint);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::requirement::Condition;
    use async_trait::async_trait;
    use rigel_env::{Message, Subscription, SubscriptionId, TokioContext};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// In-process connection used by the core tests.
    #[derive(Default)]
    pub(crate) struct ChannelConnection {
        next_id: Mutex<u64>,
        senders: Mutex<HashMap<SubscriptionId, (String, mpsc::Sender<Message>)>>,
        pub(crate) released: Mutex<Vec<SubscriptionId>>,
        pub(crate) refused_topics: Vec<String>,
    }

    impl ChannelConnection {
        pub(crate) async fn publish(&self, topic: &str, message: Message) {
            let targets: Vec<_> = self
                .senders
                .lock()
                .unwrap()
                .values()
                .filter(|(t, _)| t == topic)
                .map(|(_, tx)| tx.clone())
                .collect();
            for tx in targets {
                let _ = tx.send(message.clone()).await;
            }
        }
    }

    #[async_trait]
    impl BusConnection for ChannelConnection {
        async fn subscribe(
            &self,
            topic: &str,
            message_type: &str,
        ) -> Result<Subscription, BusError> {
            if self.refused_topics.iter().any(|t| t == topic) {
                return Err(BusError::Subscribe {
                    topic: topic.to_string(),
                    message_type: message_type.to_string(),
                    reason: "refused".to_string(),
                });
            }
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            let id = SubscriptionId(*next);
            let (tx, rx) = mpsc::channel(16);
            self.senders.lock().unwrap().insert(id, (topic.to_string(), tx));
            Ok(Subscription { id, messages: rx })
        }

        async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError> {
            self.senders.lock().unwrap().remove(&id);
            self.released.lock().unwrap().push(id);
            Ok(())
        }

        async fn close(&self) {
            self.senders.lock().unwrap().clear();
        }
    }

    /// Bus handing out one shared connection, or refusing every connect.
    pub(crate) struct ChannelBus {
        pub(crate) connection: Arc<ChannelConnection>,
        pub(crate) reachable: bool,
    }

    #[async_trait]
    impl MessageBus for ChannelBus {
        async fn connect(
            &self,
            address: IpAddr,
            port: u16,
            _timeout: Duration,
        ) -> Result<Arc<dyn BusConnection>, BusError> {
            if !self.reachable {
                return Err(BusError::connect(SocketAddr::new(address, port), "refused"));
            }
            Ok(self.connection.clone())
        }
    }

    pub(crate) async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    fn state_requirement(value: &str) -> Arc<Requirement> {
        Arc::new(
            Requirement::new(
                Condition::Equals,
                "/state",
                "std_msgs/String",
                Some("state".to_string()),
                json!(value),
            )
            .unwrap(),
        )
    }

    fn local() -> IpAddr {
        IpAddr::from([127, 0, 0, 1])
    }

    async fn open(bus: &ChannelBus) -> Result<BridgeConnection, BusError> {
        BridgeConnection::open(bus, "robot", local(), 9090, Duration::from_secs(1)).await
    }

    #[tokio::test]
    async fn test_register_and_satisfy() {
        let ctx = TokioContext::new();
        let bus = ChannelBus {
            connection: Arc::new(ChannelConnection::default()),
            reachable: true,
        };
        let mut bridge = open(&bus).await.unwrap();
        bridge.register(&ctx, state_requirement("done")).await;

        bus.connection.publish("/state", json!({"state": "running"})).await;
        bus.connection.publish("/state", json!({"state": "done"})).await;

        let status = &bridge.statuses()[0];
        assert!(wait_for(|| status.is_satisfied()).await);
        assert_eq!(status.call_count(), 2);

        // Satisfied listener releases its subscription
        let id = status.subscription().unwrap();
        assert!(wait_for(|| bus.connection.released.lock().unwrap().contains(&id)).await);
    }

    #[tokio::test]
    async fn test_refused_subscription_registers_unfed_status() {
        let ctx = TokioContext::new();
        let connection = ChannelConnection {
            refused_topics: vec!["/state".to_string()],
            ..Default::default()
        };
        let bus = ChannelBus {
            connection: Arc::new(connection),
            reachable: true,
        };
        let mut bridge = open(&bus).await.unwrap();
        bridge.register(&ctx, state_requirement("done")).await;

        assert_eq!(bridge.statuses().len(), 1);
        assert!(bridge.statuses()[0].subscription().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_bridge() {
        let bus = ChannelBus {
            connection: Arc::new(ChannelConnection::default()),
            reachable: false,
        };
        let result = open(&bus).await;
        assert!(matches!(result, Err(BusError::Connect { .. })));

        let ctx = TokioContext::new();
        let mut bridge = BridgeConnection::unobserved("robot", local(), 9090);
        bridge.register(&ctx, state_requirement("done")).await;
        assert!(!bridge.is_connected());
        assert!(!bridge.statuses()[0].is_satisfied());
    }

    #[tokio::test]
    async fn test_close_ends_listeners() {
        let ctx = TokioContext::new();
        let bus = ChannelBus {
            connection: Arc::new(ChannelConnection::default()),
            reachable: true,
        };
        let mut bridge = open(&bus).await.unwrap();
        bridge.register(&ctx, state_requirement("done")).await;
        bridge.close().await;

        assert!(!bridge.is_connected());
        bus.connection.publish("/state", json!({"state": "done"})).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(bridge.statuses()[0].call_count(), 0);
    }
}
