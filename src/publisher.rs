//! # Record Publisher
//!
//! Turns a payload and a topic name into a durably acknowledged write. The
//! publisher owns the retry and acknowledgment policy, so callers see one outcome
//! per publish:
//!
//! 1. Open one producer session, requesting the policy's [`Acks`](crate::config::Acks) level.
//! 2. Send, repeating retryable failures until `max_attempts` sends have been made.
//! 3. Release the session, whichever way the call ends.
//!
//! The publisher holds no mutable state, so one instance (or any number of clones)
//! can serve concurrent callers. Each call uses its own session.

use crate::broker::{Broker, ProducerSession};
use crate::config::PublishPolicy;
use crate::error::PublishError;
use crate::model::{DeliveryResult, PublishedRecord};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Broker client adapter. See the [module documentation](self).
pub struct RecordPublisher<B: Broker> {
    broker: Arc<B>,
    policy: PublishPolicy,
}

impl<B: Broker> Clone for RecordPublisher<B> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            policy: self.policy.clone(),
        }
    }
}

impl<B: Broker> RecordPublisher<B> {
    pub fn new(broker: B, policy: PublishPolicy) -> Self {
        Self::from_shared(Arc::new(broker), policy)
    }

    pub fn from_shared(broker: Arc<B>, policy: PublishPolicy) -> Self {
        Self { broker, policy }
    }

    pub fn policy(&self) -> &PublishPolicy {
        &self.policy
    }

    /// Publishes `payload` to `topic`, returning where the broker stored it.
    pub async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> Result<DeliveryResult, PublishError> {
        if topic.is_empty() {
            return Err(PublishError::EmptyTopic);
        }

        let mut session = self
            .broker
            .connect_producer(self.policy.acks)
            .await
            .map_err(|e| {
                error!(topic, error = %e, "Could not open producer session");
                PublishError::Connect(e)
            })?;

        let record = PublishedRecord::new(topic, payload);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match session.send(&record).await {
                Ok(delivery) => {
                    info!(
                        topic,
                        partition = delivery.partition,
                        offset = delivery.offset,
                        attempt,
                        "Record stored"
                    );
                    return Ok(delivery);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(topic, attempt, max_attempts, error = %e, "Send failed, retrying");
                    if !self.policy.retry_backoff.is_zero() {
                        tokio::time::sleep(self.policy.retry_backoff).await;
                    }
                }
                Err(e) if e.is_retryable() => {
                    error!(topic, attempts = attempt, error = %e, "Retry budget exhausted");
                    return Err(PublishError::Exhausted {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    error!(topic, attempts = attempt, error = %e, "Send rejected");
                    return Err(PublishError::Rejected {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}
