//! Typed client for the RPC surface served by [`BridgeServer`](crate::lifecycle::BridgeServer).

use crate::bridge::routes::{HEALTH_CHECK_PATH, ORDER_PATH};
use crate::bridge::{RpcStatus, DEADLINE_HEADER};
use crate::model::{HealthCheckResponse, OrderRequest, OrderResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors seen by RPC callers.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an error status.
    #[error("{code} ({status}): {message}")]
    Rpc {
        status: u16,
        code: String,
        message: String,
    },
}

impl ClientError {
    /// The server-side error code, if the server answered at all.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Rpc { code, .. } => Some(code),
            ClientError::Transport(_) => None,
        }
    }
}

/// Client for `HealthCheck` and `Order`.
///
/// Every call carries `timeout` both as the local request timeout and as the
/// deadline the server should honour.
#[derive(Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl BridgeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<HealthCheckResponse, ClientError> {
        self.call(HEALTH_CHECK_PATH, &serde_json::json!({})).await
    }

    #[instrument(skip(self))]
    pub async fn order(&self, id: &str, item_name: &str) -> Result<OrderResponse, ClientError> {
        let request = OrderRequest {
            id: id.to_string(),
            item_name: item_name.to_string(),
        };
        self.call(ORDER_PATH, &request).await
    }

    async fn call<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Sending request");
        let response = self
            .http
            .post(&url)
            .header(DEADLINE_HEADER, self.timeout.as_millis().to_string())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await?;
        let rpc = serde_json::from_str::<RpcStatus>(&text).unwrap_or(RpcStatus {
            code: "unknown".to_string(),
            message: text,
        });
        Err(ClientError::Rpc {
            status: status.as_u16(),
            code: rpc.code,
            message: rpc.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_dropped() {
        let client = BridgeClient::new("http://localhost:9090/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://localhost:9090");
    }
}
