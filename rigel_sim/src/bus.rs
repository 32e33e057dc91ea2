//! Simulated message bus with scripted per-topic feeds.

use crate::context::SimContext;
use crate::runtime::SimContainerRuntime;
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rigel_env::{
    BusConnection, BusError, Message, MessageBus, RunContext, Subscription, SubscriptionId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// One scripted message, delivered `at_ms` after the subscription starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMessage {
    pub at_ms: u64,
    pub payload: Message,
}

impl FeedMessage {
    pub fn new(at_ms: u64, payload: Message) -> Self {
        Self { at_ms, payload }
    }
}

/// Scripted traffic of one topic inside one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub container: String,
    pub topic: String,
    pub messages: Vec<FeedMessage>,
}

/// Connectivity faults injected into the bus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusFaults {
    /// Containers whose bridge refuses connections
    #[serde(default)]
    pub unreachable: Vec<String>,

    /// Topics whose subscription is refused
    #[serde(default)]
    pub refused_topics: Vec<String>,
}

/// Record of bus activity, for assertions and metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BusJournal {
    pub connections: Vec<String>,
    pub subscriptions: Vec<(String, String, SubscriptionId)>,
    pub released: Vec<(String, SubscriptionId)>,
    pub closed: Vec<String>,
    pub delivered: u64,
}

/// In-memory bus reaching the bridges of `SimContainerRuntime` containers.
pub struct SimMessageBus {
    ctx: Arc<SimContext>,
    runtime: Arc<SimContainerRuntime>,
    feeds: Vec<Feed>,
    faults: BusFaults,
    /// Upper bound of random extra delivery delay
    jitter_ms: u64,
    rng: Arc<Mutex<ChaCha8Rng>>,
    journal: Arc<Mutex<BusJournal>>,
}

impl SimMessageBus {
    /// Creates a bus with no feeds.
    pub fn new(ctx: Arc<SimContext>, runtime: Arc<SimContainerRuntime>) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(ctx.seed());
        Self {
            ctx,
            runtime,
            feeds: Vec::new(),
            faults: BusFaults::default(),
            jitter_ms: 0,
            rng: Arc::new(Mutex::new(rng)),
            journal: Arc::new(Mutex::new(BusJournal::default())),
        }
    }

    pub fn with_feed(mut self, feed: Feed) -> Self {
        self.feeds.push(feed);
        self
    }

    pub fn with_feeds(mut self, feeds: impl IntoIterator<Item = Feed>) -> Self {
        self.feeds.extend(feeds);
        self
    }

    pub fn with_faults(mut self, faults: BusFaults) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_jitter(mut self, jitter_ms: u64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    pub fn journal(&self) -> BusJournal {
        self.journal.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MessageBus for SimMessageBus {
    async fn connect(
        &self,
        address: IpAddr,
        port: u16,
        timeout: Duration,
    ) -> Result<Arc<dyn BusConnection>, BusError> {
        let endpoint = SocketAddr::new(address, port);
        let container = self.runtime.running_at(address).ok_or_else(|| BusError::Timeout {
            endpoint: endpoint.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })?;

        if self.faults.unreachable.contains(&container) {
            return Err(BusError::connect(endpoint, "connection refused"));
        }

        let mut topics: HashMap<String, Vec<FeedMessage>> = HashMap::new();
        for feed in self.feeds.iter().filter(|f| f.container == container) {
            topics
                .entry(feed.topic.clone())
                .or_default()
                .extend(feed.messages.iter().cloned());
        }

        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .connections
            .push(container.clone());

        Ok(Arc::new(SimConnection {
            container,
            ctx: Arc::clone(&self.ctx),
            topics,
            refused_topics: self.faults.refused_topics.clone(),
            jitter_ms: self.jitter_ms,
            rng: Arc::clone(&self.rng),
            journal: Arc::clone(&self.journal),
            next_id: AtomicU64::new(1),
            closed: Arc::new(AtomicBool::new(false)),
            released: Mutex::new(HashMap::new()),
        }))
    }
}

/// One connection to a simulated container bridge.
struct SimConnection {
    container: String,
    ctx: Arc<SimContext>,
    topics: HashMap<String, Vec<FeedMessage>>,
    refused_topics: Vec<String>,
    jitter_ms: u64,
    rng: Arc<Mutex<ChaCha8Rng>>,
    journal: Arc<Mutex<BusJournal>>,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    /// Per-subscription release flags
    released: Mutex<HashMap<SubscriptionId, Arc<AtomicBool>>>,
}

impl SimConnection {
    /// Delivery offsets with jitter; never earlier than the previous message,
    /// so per-topic FIFO order survives.
    fn schedule(&self, messages: &[FeedMessage]) -> Vec<(Duration, Message)> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let mut last = 0u64;
        messages
            .iter()
            .map(|m| {
                let jitter = if self.jitter_ms > 0 {
                    rng.gen_range(0..=self.jitter_ms)
                } else {
                    0
                };
                last = last.max(m.at_ms + jitter);
                (Duration::from_millis(last), m.payload.clone())
            })
            .collect()
    }
}

#[async_trait]
impl BusConnection for SimConnection {
    async fn subscribe(&self, topic: &str, message_type: &str) -> Result<Subscription, BusError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        if self.refused_topics.iter().any(|t| t == topic) {
            return Err(BusError::Subscribe {
                topic: topic.to_string(),
                message_type: message_type.to_string(),
                reason: "unknown message type".to_string(),
            });
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let messages = self.topics.get(topic).map(Vec::as_slice).unwrap_or_default();
        let schedule = self.schedule(messages);
        let (tx, rx) = mpsc::channel(schedule.len().max(1));

        let released = Arc::new(AtomicBool::new(false));
        self.released
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Arc::clone(&released));
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .subscriptions
            .push((self.container.clone(), topic.to_string(), id));

        let ctx = Arc::clone(&self.ctx);
        let closed = Arc::clone(&self.closed);
        let journal = Arc::clone(&self.journal);
        let start = ctx.now();
        let topic_name = topic.to_string();

        self.ctx.spawn(&format!("feed:{}:{}", self.container, topic), async move {
            for (offset, payload) in schedule {
                let stopped = || closed.load(Ordering::Acquire) || released.load(Ordering::Acquire);
                if !ctx.wait_until(start + offset, stopped).await {
                    return;
                }
                if tx.send(payload).await.is_err() {
                    return;
                }
                journal.lock().unwrap_or_else(|e| e.into_inner()).delivered += 1;
                debug!("Delivered message on {} at {:?}", topic_name, ctx.now());
            }
        });

        Ok(Subscription { id, messages: rx })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError> {
        if let Some(flag) = self
            .released
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
        {
            flag.store(true, Ordering::Release);
        }
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .released
            .push((self.container.clone(), id));
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.journal
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .closed
                .push(self.container.clone());
        }
    }
}
