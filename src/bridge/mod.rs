//! # Order Bridge
//!
//! The synchronous front door. An inbound `Order` call becomes one published
//! record; the caller gets an answer once the broker has acknowledged the write
//! (or the publisher gave up).
//!
//! - [`OrderBridge`] - builds the [`Order`], serializes it, publishes it to the configured topic.
//! - [`HealthReporter`] - stateless liveness answer.
//! - [`routes`] - the RPC surface (axum) exposing both.
//!
//! The bridge never retries on its own. Retrying the whole call is up to the
//! caller, keeping in mind that orders carry no idempotency key: a timed-out call
//! may still have been stored, and a repeated call stores a second record.

pub mod health;
pub mod routes;

pub use health::HealthReporter;
pub use routes::{router, RpcStatus, DEADLINE_HEADER};

use crate::broker::Broker;
use crate::error::PublishError;
use crate::model::{Order, OrderRequest, OrderResponse};
use crate::publisher::RecordPublisher;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};

/// Errors returned to RPC callers.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid request: {0}")]
    InvalidArgument(String),

    #[error("failed to marshal order: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to push order to the log: {0}")]
    Publish(#[from] PublishError),

    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl BridgeError {
    /// Stable machine-readable code carried in the error body.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::InvalidArgument(_) => "invalid_argument",
            BridgeError::Serialization(_) => "internal",
            BridgeError::Publish(_) => "unavailable",
            BridgeError::DeadlineExceeded(_) => "deadline_exceeded",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            BridgeError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BridgeError::Publish(_) => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let body = RpcStatus {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Handler for the `Order` call.
pub struct OrderBridge<B: Broker> {
    publisher: RecordPublisher<B>,
    topic: String,
}

impl<B: Broker> OrderBridge<B> {
    pub fn new(publisher: RecordPublisher<B>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publishes the order and reports success once it is acknowledged.
    #[instrument(skip(self, request), fields(order_id = %request.id))]
    pub async fn place_order(&self, request: OrderRequest) -> Result<OrderResponse, BridgeError> {
        let order = Order::from(request);
        debug!(?order, "place_order called");

        let payload = order.to_payload().map_err(|e| {
            error!(?order, error = %e, "Error marshaling order");
            BridgeError::Serialization(e)
        })?;

        self.publisher
            .publish(&self.topic, payload)
            .await
            .map_err(|e| {
                error!(?order, error = %e, "Failed to push order to the log");
                BridgeError::Publish(e)
            })?;

        Ok(OrderResponse::ordered(&order))
    }
}
