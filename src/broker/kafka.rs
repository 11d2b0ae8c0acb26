//! # Kafka Backend
//!
//! [`Broker`] implementation on top of `rdkafka`.
//!
//! - Producer sessions wrap a `FutureProducer` created per session. Opening one
//!   fetches cluster metadata first, so a dead broker fails with
//!   [`BrokerError::Connect`] within `metadata_timeout`. librdkafka's
//!   own retries are switched off (`retries=0`) so the publisher's attempt budget is
//!   the only retry loop in play.
//! - Subscriptions wrap a `StreamConsumer` that is manually assigned one partition.
//!   No consumer group offsets are committed: a restart starts again from the
//!   configured [`StartOffset`].

use super::{Broker, ProducerSession, Subscription};
use crate::config::{Acks, BrokerConfig, StartOffset};
use crate::error::BrokerError;
use crate::model::{ConsumedRecord, DeliveryResult, PublishedRecord};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::{Message, Offset, TopicPartitionList};
use std::sync::Arc;
use tracing::{debug, info};

/// Builds the librdkafka settings used by producer sessions.
pub fn producer_config(config: &BrokerConfig, acks: Acks) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", &config.brokers)
        .set("acks", acks.as_kafka_value())
        .set("retries", "0")
        .set(
            "message.timeout.ms",
            config.message_timeout.as_millis().to_string(),
        );
    client
}

/// Builds the librdkafka settings used by subscriptions.
pub fn consumer_config(config: &BrokerConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", &config.brokers)
        .set("group.id", "order-bridge-consumer")
        .set("enable.auto.commit", "false")
        .set("enable.auto.offset.store", "false")
        .set("enable.partition.eof", "false");
    client
}

/// Whether a failed produce may succeed when repeated.
fn is_retryable(error: &KafkaError) -> bool {
    let code = match error {
        KafkaError::MessageProduction(code) => *code,
        _ => return false,
    };
    matches!(
        code,
        RDKafkaErrorCode::RequestTimedOut
            | RDKafkaErrorCode::MessageTimedOut
            | RDKafkaErrorCode::NotLeaderForPartition
            | RDKafkaErrorCode::LeaderNotAvailable
            | RDKafkaErrorCode::NetworkException
            | RDKafkaErrorCode::NotEnoughReplicas
            | RDKafkaErrorCode::NotEnoughReplicasAfterAppend
            | RDKafkaErrorCode::BrokerTransportFailure
            | RDKafkaErrorCode::AllBrokersDown
            | RDKafkaErrorCode::QueueFull
    )
}

/// Broker reached through librdkafka.
#[derive(Debug, Clone)]
pub struct KafkaBroker {
    config: BrokerConfig,
}

impl KafkaBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Broker for KafkaBroker {
    type Producer = KafkaProducer;
    type Subscription = KafkaSubscription;

    async fn connect_producer(&self, acks: Acks) -> Result<KafkaProducer, BrokerError> {
        let producer: FutureProducer = producer_config(&self.config, acks)
            .create()
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        // Client creation is lazy. Ask for cluster metadata so an unreachable
        // broker is reported here instead of as a timed-out send.
        let lookup = producer.clone();
        let metadata_timeout = self.config.metadata_timeout;
        tokio::task::spawn_blocking(move || {
            lookup
                .client()
                .fetch_metadata(None, metadata_timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| BrokerError::Connect(format!("metadata lookup aborted: {e}")))?
        .map_err(|e| BrokerError::Connect(e.to_string()))?;

        debug!(
            brokers = %self.config.brokers,
            acks = acks.as_kafka_value(),
            "Producer session opened"
        );
        Ok(KafkaProducer {
            producer,
            queue_timeout: Timeout::After(self.config.message_timeout),
        })
    }

    async fn subscribe(
        &self,
        topic: &str,
        partition: i32,
        start: StartOffset,
    ) -> Result<KafkaSubscription, BrokerError> {
        let consumer: StreamConsumer = consumer_config(&self.config)
            .create()
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        let consumer = Arc::new(consumer);

        // Metadata lookups block, so they run on the blocking pool. This fails fast
        // when no broker answers or the partition does not exist.
        let lookup = Arc::clone(&consumer);
        let lookup_topic = topic.to_string();
        let metadata_timeout = self.config.metadata_timeout;
        let partitions = tokio::task::spawn_blocking(move || {
            lookup
                .fetch_metadata(Some(&lookup_topic), metadata_timeout)
                .map(|metadata| {
                    metadata
                        .topics()
                        .iter()
                        .filter(|t| t.name() == lookup_topic && t.error().is_none())
                        .flat_map(|t| t.partitions().iter().map(|p| p.id()).collect::<Vec<_>>())
                        .collect::<Vec<_>>()
                })
        })
        .await
        .map_err(|e| BrokerError::Connect(format!("metadata lookup aborted: {e}")))?
        .map_err(|e| BrokerError::Connect(e.to_string()))?;

        if !partitions.contains(&partition) {
            return Err(BrokerError::Connect(format!(
                "unknown topic or partition: {topic}/{partition}"
            )));
        }

        let offset = match start {
            StartOffset::Oldest => Offset::Beginning,
            StartOffset::Latest => Offset::End,
        };
        let mut assignment = TopicPartitionList::new();
        assignment
            .add_partition_offset(topic, partition, offset)
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        consumer
            .assign(&assignment)
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        info!(topic, partition, ?start, "Partition assigned");
        Ok(KafkaSubscription { consumer })
    }
}

/// Producer session backed by a `FutureProducer`. Dropping it closes the client.
pub struct KafkaProducer {
    producer: FutureProducer,
    queue_timeout: Timeout,
}

#[async_trait]
impl ProducerSession for KafkaProducer {
    async fn send(&mut self, record: &PublishedRecord) -> Result<DeliveryResult, BrokerError> {
        let future_record = FutureRecord::<(), [u8]>::to(&record.topic).payload(&record.payload);
        match self.producer.send(future_record, self.queue_timeout).await {
            Ok((partition, offset)) => Ok(DeliveryResult { partition, offset }),
            Err((error, _)) => Err(BrokerError::send(error.to_string(), is_retryable(&error))),
        }
    }
}

/// Subscription backed by a manually assigned `StreamConsumer`.
pub struct KafkaSubscription {
    consumer: Arc<StreamConsumer>,
}

#[async_trait]
impl Subscription for KafkaSubscription {
    async fn next_event(&mut self) -> Option<Result<ConsumedRecord, BrokerError>> {
        let event = match self.consumer.recv().await {
            Ok(message) => Ok(ConsumedRecord {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            }),
            Err(error) => Err(BrokerError::Consume(error.to_string())),
        };
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_producer_waits_for_all_replicas_without_client_retries() {
        let config = BrokerConfig {
            message_timeout: Duration::from_secs(5),
            ..BrokerConfig::default()
        };
        let client = producer_config(&config, Acks::All);

        assert_eq!(client.get("bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(client.get("acks"), Some("all"));
        assert_eq!(client.get("retries"), Some("0"));
        assert_eq!(client.get("message.timeout.ms"), Some("5000"));
    }

    #[test]
    fn test_consumer_never_commits_offsets() {
        let client = consumer_config(&BrokerConfig::default());
        assert_eq!(client.get("enable.auto.commit"), Some("false"));
        assert_eq!(client.get("enable.partition.eof"), Some("false"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable(&KafkaError::MessageProduction(
            RDKafkaErrorCode::NotEnoughReplicas
        )));
        assert!(is_retryable(&KafkaError::MessageProduction(
            RDKafkaErrorCode::MessageTimedOut
        )));
        assert!(!is_retryable(&KafkaError::MessageProduction(
            RDKafkaErrorCode::MessageSizeTooLarge
        )));
        assert!(!is_retryable(&KafkaError::Canceled));
    }
}
