//! # Broker Contract
//!
//! The publisher and the consumer loop only ever talk to the log through these
//! traits. Two backends implement them:
//!
//! - [`MemoryBroker`] - an in-process partitioned log with fault injection, used by
//!   the test suite and handy for local experiments.
//! - `KafkaBroker` (feature `kafka`) - the rdkafka-backed implementation used by the
//!   binaries.
//!
//! ## Resource Scoping
//!
//! Producer sessions and subscriptions are acquired per use and released when
//! dropped. Backends must release everything in `Drop`, so early returns, errors,
//! and cancelled futures all clean up the same way.

use crate::config::{Acks, StartOffset};
use crate::error::BrokerError;
use crate::model::{ConsumedRecord, DeliveryResult, PublishedRecord};
use async_trait::async_trait;

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
pub use memory::MemoryBroker;

/// An append-only, partitioned, at-least-once log.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    type Producer: ProducerSession + 'static;
    type Subscription: Subscription + 'static;

    /// Opens a producer session that waits for `acks` on every write.
    async fn connect_producer(&self, acks: Acks) -> Result<Self::Producer, BrokerError>;

    /// Attaches to a single partition. Fails with [`BrokerError::Connect`] when the
    /// broker is unreachable or the topic/partition does not exist.
    async fn subscribe(
        &self,
        topic: &str,
        partition: i32,
        start: StartOffset,
    ) -> Result<Self::Subscription, BrokerError>;
}

/// A live connection able to write records.
#[async_trait]
pub trait ProducerSession: Send {
    /// Writes one record and waits for the acknowledgment level the session was
    /// opened with. Exactly one attempt; retrying is the caller's business.
    async fn send(&mut self, record: &PublishedRecord) -> Result<DeliveryResult, BrokerError>;
}

/// A live attachment to one partition.
#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next record or delivery error.
    ///
    /// Returns `None` once the broker has closed the subscription. Must be
    /// cancel-safe: dropping the future before it resolves loses nothing.
    async fn next_event(&mut self) -> Option<Result<ConsumedRecord, BrokerError>>;
}
