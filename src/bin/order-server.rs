//! RPC front door: accepts `Order` / `HealthCheck` calls and publishes orders to Kafka.

use anyhow::Context;
use clap::Parser;
use order_bridge::bridge::OrderBridge;
use order_bridge::broker::KafkaBroker;
use order_bridge::config::{BrokerConfig, PublishPolicy, ServerConfig, DEFAULT_TOPIC};
use order_bridge::lifecycle::{cancel_on_signal, setup_tracing, BridgeServer};
use order_bridge::publisher::RecordPublisher;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "order-server", about = "Publishes orders received over RPC to the order log")]
struct Cli {
    /// Address the RPC listener binds to.
    #[arg(long, default_value = "0.0.0.0:9090", env = "ORDER_BRIDGE_LISTEN")]
    listen: SocketAddr,

    /// Comma-separated Kafka bootstrap servers.
    #[arg(long, default_value = "localhost:9092", env = "ORDER_BRIDGE_BROKERS")]
    brokers: String,

    #[arg(long, default_value = DEFAULT_TOPIC, env = "ORDER_BRIDGE_TOPIC")]
    topic: String,

    /// Total send attempts per order, the first one included.
    #[arg(
        long,
        default_value_t = 5,
        env = "ORDER_BRIDGE_MAX_ATTEMPTS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_attempts: u32,

    #[arg(long, default_value_t = 100, env = "ORDER_BRIDGE_RETRY_BACKOFF_MS")]
    retry_backoff_ms: u64,

    /// Deadline for calls that do not send one.
    #[arg(long, default_value_t = 30_000, env = "ORDER_BRIDGE_DEADLINE_MS")]
    deadline_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    let broker_config = BrokerConfig {
        brokers: cli.brokers,
        topic: cli.topic,
        ..BrokerConfig::default()
    };
    let policy = PublishPolicy {
        max_attempts: cli.max_attempts,
        retry_backoff: Duration::from_millis(cli.retry_backoff_ms),
        ..PublishPolicy::default()
    };
    let server_config = ServerConfig {
        listen_addr: cli.listen,
        default_deadline: Duration::from_millis(cli.deadline_ms),
    };

    let topic = broker_config.topic.clone();
    let brokers = broker_config.brokers.clone();
    let publisher = RecordPublisher::new(KafkaBroker::new(broker_config), policy);
    let bridge = Arc::new(OrderBridge::new(publisher, topic.clone()));

    let server = BridgeServer::bind(&server_config, bridge)
        .await
        .with_context(|| format!("failed to listen on {}", server_config.listen_addr))?;
    info!(addr = %server.local_addr(), %brokers, %topic, "Serving");

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());
    server.serve(shutdown).await?;
    Ok(())
}
