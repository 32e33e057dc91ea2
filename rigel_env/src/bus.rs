//! Message bus abstraction (rosbridge-style publish/subscribe).

use crate::error::BusError;
use crate::types::{Subscription, SubscriptionId};
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Factory for connections to a container's message bus endpoint.
///
/// # Implementations
///
/// - **Production**: a rosbridge websocket client
/// - **Simulation**: `SimMessageBus` with scripted per-topic feeds
#[async_trait]
pub trait MessageBus: Send + Sync + 'static {
    /// Connects to the bus endpoint at `address:port`.
    ///
    /// # Returns
    /// * `Err(BusError::Connect)` - endpoint refused the connection
    /// * `Err(BusError::Timeout)` - endpoint unreachable within `timeout`
    async fn connect(
        &self,
        address: IpAddr,
        port: u16,
        timeout: Duration,
    ) -> Result<Arc<dyn BusConnection>, BusError>;
}

/// One live connection to a bus endpoint.
///
/// # Message Flow
///
/// ```text
/// Bus endpoint              Connection                 Listener
///   |                           |                          |
///   |-- publish(topic, msg) --->|                          |
///   |                           |-- messages.send(msg) --->|
///   |                           |<-- unsubscribe(id) ------|  (once satisfied)
/// ```
///
/// Messages of one subscription are delivered in bus order (FIFO per topic).
#[async_trait]
pub trait BusConnection: Send + Sync + 'static {
    /// Subscribes to `topic`, decoding messages as `message_type`.
    async fn subscribe(&self, topic: &str, message_type: &str) -> Result<Subscription, BusError>;

    /// Releases a subscription; its message stream ends.
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError>;

    /// Closes the connection; every remaining message stream ends.
    async fn close(&self);
}
