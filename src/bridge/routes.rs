//! # RPC Routes
//!
//! JSON request/response calls served by axum. Paths follow gRPC method naming so
//! the surface reads like the `KafkaService` it stands in for:
//!
//! | Method | Path                               | Request                  | Reply                    |
//! |--------|------------------------------------|--------------------------|--------------------------|
//! | POST   | `/kafka.KafkaService/HealthCheck`  | empty or `{}`            | `{message, status}`      |
//! | POST   | `/kafka.KafkaService/Order`        | `{id, item_name}`        | `{message, success}`     |
//!
//! A caller sets its deadline with the [`DEADLINE_HEADER`] header (milliseconds).
//! Without it, the server's default deadline applies. Errors come back as
//! [`RpcStatus`] bodies with a non-2xx status.

use super::{BridgeError, HealthReporter, OrderBridge};
use crate::broker::Broker;
use crate::model::{HealthCheckResponse, OrderRequest, OrderResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Header carrying the caller's deadline in milliseconds.
pub const DEADLINE_HEADER: &str = "x-request-timeout-ms";

pub const HEALTH_CHECK_PATH: &str = "/kafka.KafkaService/HealthCheck";
pub const ORDER_PATH: &str = "/kafka.KafkaService/Order";

/// Error body returned for failed calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcStatus {
    pub code: String,
    pub message: String,
}

struct RpcState<B: Broker> {
    bridge: Arc<OrderBridge<B>>,
    health: HealthReporter,
    default_deadline: Duration,
}

impl<B: Broker> Clone for RpcState<B> {
    fn clone(&self) -> Self {
        Self {
            bridge: Arc::clone(&self.bridge),
            health: self.health,
            default_deadline: self.default_deadline,
        }
    }
}

/// Builds the RPC router around `bridge`.
pub fn router<B: Broker>(bridge: Arc<OrderBridge<B>>, default_deadline: Duration) -> Router {
    let state = RpcState {
        bridge,
        health: HealthReporter,
        default_deadline,
    };
    Router::new()
        .route(HEALTH_CHECK_PATH, post(health_check::<B>))
        .route(ORDER_PATH, post(order::<B>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check<B: Broker>(State(state): State<RpcState<B>>) -> Json<HealthCheckResponse> {
    Json(state.health.check())
}

async fn order<B: Broker>(
    State(state): State<RpcState<B>>,
    headers: HeaderMap,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, BridgeError> {
    let deadline = caller_deadline(&headers)?.unwrap_or(state.default_deadline);
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected malformed order request");
        BridgeError::InvalidArgument(rejection.body_text())
    })?;

    let order_id = request.id.clone();
    match tokio::time::timeout(deadline, state.bridge.place_order(request)).await {
        Ok(result) => result.map(Json),
        Err(_) => {
            // The record may still land: the in-flight attempt is abandoned, not undone.
            warn!(%order_id, ?deadline, "Order call exceeded its deadline");
            Err(BridgeError::DeadlineExceeded(deadline))
        }
    }
}

fn caller_deadline(headers: &HeaderMap) -> Result<Option<Duration>, BridgeError> {
    let Some(value) = headers.get(DEADLINE_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(|millis| Some(Duration::from_millis(millis)))
        .ok_or_else(|| {
            BridgeError::InvalidArgument(format!(
                "{DEADLINE_HEADER} must be a whole number of milliseconds"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_missing_deadline_header_uses_default() {
        assert_eq!(caller_deadline(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn test_deadline_header_is_parsed_as_millis() {
        let mut headers = HeaderMap::new();
        headers.insert(DEADLINE_HEADER, HeaderValue::from_static("1500"));
        assert_eq!(
            caller_deadline(&headers).unwrap(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_garbage_deadline_header_is_invalid_argument() {
        let mut headers = HeaderMap::new();
        headers.insert(DEADLINE_HEADER, HeaderValue::from_static("soon"));
        let err = caller_deadline(&headers).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }
}
