use crate::bridge::{router, OrderBridge};
use crate::broker::Broker;
use crate::config::ServerConfig;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Failures while bringing the RPC listener up or serving on it.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("RPC server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// The RPC listener with the bridge routes mounted on it.
///
/// # Example
///
/// ```ignore
/// let server = BridgeServer::bind(&ServerConfig::default(), bridge).await?;
/// let shutdown = CancellationToken::new();
/// cancel_on_signal(shutdown.clone());
/// server.serve(shutdown).await?;
/// ```
pub struct BridgeServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    app: Router,
}

impl BridgeServer {
    /// Binds the listener. A bind failure is fatal and reported right away;
    /// nothing retries it.
    pub async fn bind<B: Broker>(
        config: &ServerConfig,
        bridge: Arc<OrderBridge<B>>,
    ) -> Result<Self, LifecycleError> {
        let addr = config.listen_addr;
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            error!(%addr, error = %source, "Failed to listen");
            LifecycleError::Bind { addr, source }
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| LifecycleError::Bind { addr, source })?;

        Ok(Self {
            listener,
            local_addr,
            app: router(bridge, config.default_deadline),
        })
    }

    /// Address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves calls until `shutdown` is cancelled, then lets in-flight calls finish.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), LifecycleError> {
        info!(addr = %self.local_addr, "Serving RPC");
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(LifecycleError::Serve)?;
        info!("RPC server stopped");
        Ok(())
    }
}
