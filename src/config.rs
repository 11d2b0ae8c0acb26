//! # Configuration
//!
//! Every component receives its configuration explicitly at construction time.
//! Nothing reads process-wide constants: the defaults below reproduce the
//! reference deployment (`localhost:9092`, topic `orders`, partition 0, port 9090).
//!
//! The binaries build these structs from clap arguments (see `src/bin/`), so the
//! deployment-facing fields can also be set through `ORDER_BRIDGE_*` environment
//! variables.

use std::net::SocketAddr;
use std::time::Duration;

/// Name of the single topic orders are written to and read from.
pub const DEFAULT_TOPIC: &str = "orders";

/// Where the broker lives and which log this process talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Comma-separated `host:port` bootstrap list.
    pub brokers: String,
    pub topic: String,
    /// Partition read by the consumer. Producers let the broker pick.
    pub partition: i32,
    /// Upper bound the broker client spends on a single delivery attempt.
    ///
    /// A whole publish (connect, every attempt, every backoff) must fit inside the
    /// RPC deadline, or retries never get to run: keep
    /// `metadata_timeout + max_attempts * message_timeout` below
    /// [`ServerConfig::default_deadline`].
    pub message_timeout: Duration,
    /// Upper bound for the metadata lookup made when a session or subscription opens.
    pub metadata_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            partition: 0,
            message_timeout: Duration::from_secs(5),
            metadata_timeout: Duration::from_secs(3),
        }
    }
}

/// Acknowledgment level requested from the broker for each write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Acks {
    /// Wait for every in-sync replica.
    #[default]
    All,
    /// Wait for the partition leader only.
    Leader,
    /// Fire and forget.
    None,
}

impl Acks {
    /// Value understood by the Kafka `acks` client property.
    pub fn as_kafka_value(&self) -> &'static str {
        match self {
            Acks::All => "all",
            Acks::Leader => "1",
            Acks::None => "0",
        }
    }
}

/// Retry and durability policy owned by the publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPolicy {
    pub acks: Acks,
    /// Total send attempts per publish, the first one included.
    pub max_attempts: u32,
    /// Pause between two attempts after a retryable failure.
    pub retry_backoff: Duration,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            acks: Acks::All,
            max_attempts: 5,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

/// RPC listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Deadline applied to calls that do not carry one.
    pub default_deadline: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            default_deadline: Duration::from_secs(30),
        }
    }
}

/// Where a fresh subscription begins reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartOffset {
    /// Oldest retained record. With no stored checkpoint this replays the whole log.
    #[default]
    Oldest,
    /// Only records written after the subscription is established.
    Latest,
}

impl std::str::FromStr for StartOffset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "oldest" | "earliest" | "beginning" => Ok(StartOffset::Oldest),
            "latest" | "end" => Ok(StartOffset::Latest),
            other => Err(format!("unknown start offset `{other}` (expected oldest|latest)")),
        }
    }
}

/// Consumer loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsumerConfig {
    pub start: StartOffset,
    /// `None` keeps the loop alive through any number of delivery errors.
    /// `Some(n)` fails the loop once `n` errors arrive without a message in between.
    pub max_consecutive_errors: Option<u32>,
}
