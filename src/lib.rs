#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Order Bridge
//!
//! > **A synchronous front door for an asynchronous, partitioned log.**
//!
//! Callers place orders through a request/response RPC. Each order becomes one
//! durably acknowledged record on the `orders` topic. A separate, long-running
//! consumer reads that topic back, counting and logging every record until it is
//! told to stop.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Two halves, one contract
//!
//! - **Publishing** ([`bridge`] → [`publisher`]): validate, serialize, publish with a
//!   bounded retry budget, answer the caller.
//! - **Consuming** ([`consumer`]): subscribe to one partition from the oldest
//!   offset, drain it sequentially, stop deterministically on a signal.
//!
//! The halves share nothing but the [`broker::Broker`] trait. Swap Kafka for the
//! in-memory broker and both halves run unchanged, which is how the tests work.
//!
//! ### Delivery semantics
//!
//! At-least-once, with no deduplication anywhere:
//! - A call that times out may still have been stored.
//! - Two calls with the same order `id` store two records.
//! - The consumer keeps no checkpoint, so every restart replays the retained log.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Type-Safe Error Handling
//! Each layer has its own `thiserror` enum ([`error::BrokerError`],
//! [`error::PublishError`], [`bridge::BridgeError`], [`error::ConsumerError`]). Retries
//! are exhausted inside the publisher before any error reaches the bridge; the bridge
//! never retries.
//!
//! ### 2. Explicit Configuration
//! Topic, addresses, retry budget and deadlines live in [`config`] structs handed to
//! each component at construction. The defaults reproduce the reference deployment.
//!
//! ### 3. Concurrency Model
//! RPC handlers run concurrently and share only immutable configuration; every
//! publish opens its own producer session. The consumer is a single task that
//! multiplexes broker events and the shutdown token in one `select!`, so it never
//! handles two events at once and needs no locks.
//!
//! ### 4. Observability
//! `tracing` everywhere with structured fields. See [`lifecycle::tracing`].
//!
//! ## 🗺️ Module Tour
//!
//! - [`broker`]: the broker contract plus the Kafka and in-memory backends.
//! - [`publisher`]: the broker client adapter (acks, retries, scoped sessions).
//! - [`bridge`]: the `Order` and `HealthCheck` handlers and their RPC routes.
//! - [`consumer`]: the consumer loop state machine.
//! - [`lifecycle`]: listener bring-up, signals, tracing.
//! - [`client`]: typed RPC client.
//! - [`model`], [`config`], [`error`]: data, settings, failures.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Terminal 1: RPC server on :9090, broker on localhost:9092
//! RUST_LOG=info cargo run --bin order-server
//!
//! # Terminal 2: consumer (Ctrl+C to stop)
//! cargo run --bin order-consumer
//!
//! # Terminal 3: health checks, then one order
//! cargo run --bin order-client
//! cargo run --bin order-client -- order --id 1 --item keyboard
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod bridge;
pub mod broker;
pub mod client;
pub mod config;
pub mod consumer;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod publisher;
