//! # Observability & Tracing
//!
//! [`setup_tracing`] installs structured logging for the binaries.
//!
//! ## Configuration
//!
//! Log levels come from `RUST_LOG` and default to `info`. The compact format hides
//! module paths (`with_target(false)`); the structured fields carry the context.
//!
//! ```bash
//! # Default
//! order-server
//!
//! # Log every order payload on entry
//! RUST_LOG=debug order-server
//!
//! # Only the consumer loop, verbosely
//! RUST_LOG=order_bridge::consumer=debug order-consumer
//! ```
//!
//! ## What Gets Logged
//!
//! - **Publishing**: one `info` line per stored record with topic, partition, offset
//!   and attempt number; `warn` per retry; `error` when the budget runs out.
//! - **Bridge**: the order at `debug` on entry, every failure at `error` with the
//!   order and the cause.
//! - **Consumer**: one `info` line per message (`count`, `topic`, `partition`,
//!   `offset`, `message`), `warn` per delivery error, state transitions, and a
//!   final summary.
//! - **RPC**: request/response spans from `tower_http::trace::TraceLayer`.
//!
//! A stored order looks like this at `info`:
//!
//! ```text
//! INFO Record stored topic="orders" partition=0 offset=12 attempt=1
//! INFO Received message count=13 topic=orders partition=0 offset=12 message={"id":"12","item_name":"desk"}
//! ```

use tracing_subscriber::EnvFilter;

pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
