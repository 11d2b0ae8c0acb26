//! Minimal RPC caller: repeated health checks, or a single order.

use clap::{Parser, Subcommand};
use order_bridge::client::BridgeClient;
use order_bridge::lifecycle::setup_tracing;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "order-client", about = "Calls the order bridge RPC surface")]
struct Cli {
    /// Base URL of the order server.
    #[arg(long, default_value = "http://localhost:9090", env = "ORDER_BRIDGE_SERVER")]
    server: String,

    /// Per-call deadline, sent to the server and enforced locally.
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Call HealthCheck `count` times (the default command).
    Health {
        #[arg(long, default_value_t = 5)]
        count: u32,
    },
    /// Place one order.
    Order {
        #[arg(long)]
        id: String,
        #[arg(long = "item")]
        item_name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    let cli = Cli::parse();
    let client = BridgeClient::new(cli.server, Duration::from_millis(cli.timeout_ms))?;

    match cli.command.unwrap_or(Command::Health { count: 5 }) {
        Command::Health { count } => {
            for _ in 0..count {
                let response = client.health_check().await?;
                println!("HealthCheck Response: {}, Status: {}", response.message, response.status);
            }
        }
        Command::Order { id, item_name } => {
            let response = client.order(&id, &item_name).await?;
            println!("Order Response: {}, Success: {}", response.message, response.success);
        }
    }
    Ok(())
}
