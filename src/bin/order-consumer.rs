//! Reads the order log back, logging every record until SIGINT/SIGTERM.

use clap::Parser;
use order_bridge::broker::KafkaBroker;
use order_bridge::config::{BrokerConfig, ConsumerConfig, StartOffset, DEFAULT_TOPIC};
use order_bridge::consumer::ConsumerLoop;
use order_bridge::lifecycle::{cancel_on_signal, setup_tracing};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "order-consumer", about = "Drains one partition of the order log")]
struct Cli {
    /// Comma-separated Kafka bootstrap servers.
    #[arg(long, default_value = "localhost:9092", env = "ORDER_BRIDGE_BROKERS")]
    brokers: String,

    #[arg(long, default_value = DEFAULT_TOPIC, env = "ORDER_BRIDGE_TOPIC")]
    topic: String,

    #[arg(long, default_value_t = 0, env = "ORDER_BRIDGE_PARTITION")]
    partition: i32,

    /// Where to begin reading: `oldest` replays the retained log, `latest` skips it.
    #[arg(long, default_value = "oldest", env = "ORDER_BRIDGE_START")]
    start: StartOffset,

    /// Stop after this many delivery errors in a row. Unset keeps going forever.
    #[arg(long)]
    max_consecutive_errors: Option<u32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_tracing();
    let cli = Cli::parse();

    let broker_config = BrokerConfig {
        brokers: cli.brokers,
        topic: cli.topic,
        partition: cli.partition,
        ..BrokerConfig::default()
    };
    let config = ConsumerConfig {
        start: cli.start,
        max_consecutive_errors: cli.max_consecutive_errors,
    };

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    let topic = broker_config.topic.clone();
    let partition = broker_config.partition;
    let consumer = ConsumerLoop::new(KafkaBroker::new(broker_config), topic, partition, config);
    match consumer.run(shutdown).await {
        Ok(report) => {
            info!(delivered = report.delivered, errors = report.errors, "Consumer stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Consumer exited with an error");
            ExitCode::FAILURE
        }
    }
}
