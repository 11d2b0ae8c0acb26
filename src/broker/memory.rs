//! # In-Memory Broker
//!
//! A [`Broker`] that keeps its log in process memory. It behaves like a tiny Kafka:
//! topics are created on first write, every partition is an append-only vector
//! whose index is the offset, and subscribers see records in append order.
//!
//! The interesting part for tests is fault injection and introspection:
//!
//! ```rust
//! use order_bridge::broker::MemoryBroker;
//!
//! let broker = MemoryBroker::new();
//! broker.fail_next_sends(2, true); // two retryable failures, then success
//! assert_eq!(broker.send_attempts(), 0);
//! ```
//!
//! All clones share the same log.

use super::{Broker, ProducerSession, Subscription};
use crate::config::{Acks, StartOffset};
use crate::error::BrokerError;
use crate::model::{ConsumedRecord, DeliveryResult, PublishedRecord};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SendFault {
    #[default]
    None,
    Next { remaining: usize, retryable: bool },
    Always { retryable: bool },
    Stall,
}

#[derive(Debug, Default)]
struct State {
    /// topic -> partitions -> records (index == offset)
    topics: HashMap<String, Vec<Vec<ConsumedRecord>>>,
    send_fault: SendFault,
    refuse_connections: bool,
    pending_consume_errors: VecDeque<String>,
    subscriptions_closed: bool,
    send_attempts: usize,
    producer_sessions_opened: usize,
    open_producers: usize,
    open_subscriptions: usize,
    last_acks: Option<Acks>,
}

impl State {
    /// Consumes one injected failure, if any is scheduled.
    fn take_send_failure(&mut self) -> Option<BrokerError> {
        match self.send_fault {
            SendFault::None | SendFault::Stall => None,
            SendFault::Always { retryable } => {
                Some(BrokerError::send("injected send failure", retryable))
            }
            SendFault::Next {
                remaining,
                retryable,
            } => {
                self.send_fault = if remaining <= 1 {
                    SendFault::None
                } else {
                    SendFault::Next {
                        remaining: remaining - 1,
                        retryable,
                    }
                };
                Some(BrokerError::send("injected send failure", retryable))
            }
        }
    }

    fn append(&mut self, topic: &str, payload: Vec<u8>) -> DeliveryResult {
        let partitions = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new()]);
        let log = &mut partitions[0];
        let offset = log.len() as i64;
        log.push(ConsumedRecord {
            topic: topic.to_string(),
            partition: 0,
            offset,
            payload,
        });
        DeliveryResult {
            partition: 0,
            offset,
        }
    }
}

struct Inner {
    state: Mutex<State>,
    /// Bumped after every change a subscriber may care about.
    changes: watch::Sender<u64>,
}

/// Shared in-process log. See the [module documentation](self).
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                changes,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.inner.changes.send_modify(|version| *version += 1);
    }

    /// Creates `topic` with `partitions` empty partitions. No-op if it exists.
    pub fn create_topic(&self, topic: &str, partitions: usize) {
        self.state()
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); partitions.max(1)]);
    }

    /// Appends a record to partition 0 directly, bypassing producer sessions and faults.
    pub fn append(&self, topic: &str, payload: impl Into<Vec<u8>>) -> DeliveryResult {
        let delivery = self.state().append(topic, payload.into());
        self.notify();
        delivery
    }

    /// The next `count` sends fail, after which sends succeed again.
    pub fn fail_next_sends(&self, count: usize, retryable: bool) {
        self.state().send_fault = if count == 0 {
            SendFault::None
        } else {
            SendFault::Next {
                remaining: count,
                retryable,
            }
        };
    }

    /// Every send fails until [`heal`](Self::heal) is called.
    pub fn fail_all_sends(&self, retryable: bool) {
        self.state().send_fault = SendFault::Always { retryable };
    }

    /// Sends never complete, as with a broker that accepts the connection and then hangs.
    pub fn stall_sends(&self) {
        self.state().send_fault = SendFault::Stall;
    }

    /// Clears send faults and connection refusal.
    pub fn heal(&self) {
        let mut state = self.state();
        state.send_fault = SendFault::None;
        state.refuse_connections = false;
    }

    /// New producer sessions and subscriptions fail with [`BrokerError::Connect`].
    pub fn refuse_connections(&self) {
        self.state().refuse_connections = true;
    }

    /// Queues a delivery error for the next subscription that polls.
    pub fn inject_consume_error(&self, message: impl Into<String>) {
        self.state().pending_consume_errors.push_back(message.into());
        self.notify();
    }

    /// Ends every current and future subscription, as if the broker went away.
    pub fn close_subscriptions(&self) {
        self.state().subscriptions_closed = true;
        self.notify();
    }

    /// Snapshot of one partition's log.
    pub fn records(&self, topic: &str, partition: i32) -> Vec<ConsumedRecord> {
        self.state()
            .topics
            .get(topic)
            .and_then(|partitions| usize::try_from(partition).ok().and_then(|p| partitions.get(p)))
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of send attempts, failed ones included.
    pub fn send_attempts(&self) -> usize {
        self.state().send_attempts
    }

    pub fn producer_sessions_opened(&self) -> usize {
        self.state().producer_sessions_opened
    }

    pub fn open_producer_sessions(&self) -> usize {
        self.state().open_producers
    }

    pub fn open_subscriptions(&self) -> usize {
        self.state().open_subscriptions
    }

    /// Acknowledgment level requested by the most recent producer session.
    pub fn last_acks(&self) -> Option<Acks> {
        self.state().last_acks
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    type Producer = MemoryProducer;
    type Subscription = MemorySubscription;

    async fn connect_producer(&self, acks: Acks) -> Result<MemoryProducer, BrokerError> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(BrokerError::Connect("connection refused".to_string()));
        }
        state.producer_sessions_opened += 1;
        state.open_producers += 1;
        state.last_acks = Some(acks);
        debug!(open = state.open_producers, ?acks, "Producer session opened");
        Ok(MemoryProducer {
            broker: self.clone(),
        })
    }

    async fn subscribe(
        &self,
        topic: &str,
        partition: i32,
        start: StartOffset,
    ) -> Result<MemorySubscription, BrokerError> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(BrokerError::Connect("connection refused".to_string()));
        }
        let log_len = state
            .topics
            .get(topic)
            .and_then(|partitions| usize::try_from(partition).ok().and_then(|p| partitions.get(p)))
            .map(Vec::len)
            .ok_or_else(|| {
                BrokerError::Connect(format!("unknown topic or partition: {topic}/{partition}"))
            })?;
        state.open_subscriptions += 1;
        let next = match start {
            StartOffset::Oldest => 0,
            StartOffset::Latest => log_len,
        };
        debug!(topic, partition, next, "Subscription opened");
        Ok(MemorySubscription {
            broker: self.clone(),
            changes: self.inner.changes.subscribe(),
            topic: topic.to_string(),
            partition: partition as usize,
            next,
        })
    }
}

/// Producer session on a [`MemoryBroker`].
pub struct MemoryProducer {
    broker: MemoryBroker,
}

#[async_trait]
impl ProducerSession for MemoryProducer {
    async fn send(&mut self, record: &PublishedRecord) -> Result<DeliveryResult, BrokerError> {
        let stalled = {
            let mut state = self.broker.state();
            state.send_attempts += 1;
            if let Some(err) = state.take_send_failure() {
                return Err(err);
            }
            state.send_fault == SendFault::Stall
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        let delivery = self.broker.state().append(&record.topic, record.payload.clone());
        self.broker.notify();
        Ok(delivery)
    }
}

impl Drop for MemoryProducer {
    fn drop(&mut self) {
        let mut state = self.broker.state();
        state.open_producers = state.open_producers.saturating_sub(1);
    }
}

/// Subscription to one partition of a [`MemoryBroker`].
pub struct MemorySubscription {
    broker: MemoryBroker,
    changes: watch::Receiver<u64>,
    topic: String,
    partition: usize,
    next: usize,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next_event(&mut self) -> Option<Result<ConsumedRecord, BrokerError>> {
        loop {
            {
                // Mark the current version seen before looking, so an append that
                // lands after the check still wakes `changed()` below.
                self.changes.borrow_and_update();
                let mut state = self.broker.state();
                if state.subscriptions_closed {
                    return None;
                }
                if let Some(message) = state.pending_consume_errors.pop_front() {
                    return Some(Err(BrokerError::Consume(message)));
                }
                let record = state
                    .topics
                    .get(&self.topic)
                    .and_then(|partitions| partitions.get(self.partition))
                    .and_then(|log| log.get(self.next))
                    .cloned();
                if let Some(record) = record {
                    self.next += 1;
                    return Some(Ok(record));
                }
            }
            if self.changes.changed().await.is_err() {
                return None;
            }
        }
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        let mut state = self.broker.state();
        state.open_subscriptions = state.open_subscriptions.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(payload: &str) -> PublishedRecord {
        PublishedRecord::new("orders", payload.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_offsets_follow_append_order() {
        let broker = MemoryBroker::new();
        let mut producer = broker.connect_producer(Acks::All).await.unwrap();

        let first = producer.send(&record("a")).await.unwrap();
        let second = producer.send(&record("b")).await.unwrap();

        assert_eq!(first, DeliveryResult { partition: 0, offset: 0 });
        assert_eq!(second, DeliveryResult { partition: 0, offset: 1 });
        assert_eq!(broker.records("orders", 0).len(), 2);
        assert_eq!(broker.last_acks(), Some(Acks::All));
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_in_order() {
        let broker = MemoryBroker::new();
        broker.fail_next_sends(2, true);
        let mut producer = broker.connect_producer(Acks::All).await.unwrap();

        assert!(producer.send(&record("a")).await.unwrap_err().is_retryable());
        assert!(producer.send(&record("a")).await.is_err());
        assert!(producer.send(&record("a")).await.is_ok());
        assert_eq!(broker.send_attempts(), 3);
        assert_eq!(broker.records("orders", 0).len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_released_on_drop() {
        let broker = MemoryBroker::new();
        broker.create_topic("orders", 1);

        let producer = broker.connect_producer(Acks::All).await.unwrap();
        let subscription = broker.subscribe("orders", 0, StartOffset::Oldest).await.unwrap();
        assert_eq!(broker.open_producer_sessions(), 1);
        assert_eq!(broker.open_subscriptions(), 1);

        drop(producer);
        drop(subscription);
        assert_eq!(broker.open_producer_sessions(), 0);
        assert_eq!(broker.open_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_to_unknown_partition_fails() {
        let broker = MemoryBroker::new();
        broker.create_topic("orders", 1);

        let err = broker.subscribe("orders", 3, StartOffset::Oldest).await.err().unwrap();
        assert!(matches!(err, BrokerError::Connect(_)));
        let err = broker.subscribe("payments", 0, StartOffset::Oldest).await.err().unwrap();
        assert!(matches!(err, BrokerError::Connect(_)));
    }

    #[tokio::test]
    async fn test_subscriber_wakes_on_append() {
        let broker = MemoryBroker::new();
        broker.create_topic("orders", 1);
        let mut subscription = broker.subscribe("orders", 0, StartOffset::Oldest).await.unwrap();

        let writer = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.append("orders", "late");
        });

        let event = tokio::time::timeout(Duration::from_secs(2), subscription.next_event())
            .await
            .expect("subscriber was not woken")
            .unwrap()
            .unwrap();
        assert_eq!(event.payload, b"late");
        assert_eq!(event.offset, 0);
    }

    #[tokio::test]
    async fn test_latest_skips_existing_records() {
        let broker = MemoryBroker::new();
        broker.append("orders", "old");
        let mut subscription = broker.subscribe("orders", 0, StartOffset::Latest).await.unwrap();
        broker.append("orders", "new");

        let event = subscription.next_event().await.unwrap().unwrap();
        assert_eq!(event.payload, b"new");
        assert_eq!(event.offset, 1);
    }

    #[tokio::test]
    async fn test_closed_subscription_ends_stream() {
        let broker = MemoryBroker::new();
        broker.create_topic("orders", 1);
        let mut subscription = broker.subscribe("orders", 0, StartOffset::Oldest).await.unwrap();

        broker.close_subscriptions();
        assert!(subscription.next_event().await.is_none());
    }
}
