//! Process lifecycle: listener bring-up, signal-driven shutdown, and tracing set-up.
//!
//! # Main Components
//!
//! - [`BridgeServer`] - binds the RPC listener and serves until a token is cancelled
//! - [`cancel_on_signal`] - turns SIGINT/SIGTERM into a cancelled token
//! - [`setup_tracing`] - initializes the tracing/logging infrastructure
//!
//! Both binaries drive their work with a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! instead of blocking forever, so the same code paths run under test without
//! sending real signals.

pub mod server;
pub mod signal;
pub mod tracing;

pub use self::server::*;
pub use self::signal::*;
pub use self::tracing::*;
