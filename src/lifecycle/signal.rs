use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Which termination signal arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

/// Resolves on the first SIGINT or SIGTERM.
///
/// A handler that cannot be installed is logged and treated as a signal that never fires.
pub async fn shutdown_signal() -> ShutdownSignal {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => ShutdownSignal::Interrupt,
        _ = terminate => ShutdownSignal::Terminate,
    }
}

/// Cancels `token` when a termination signal arrives.
///
/// The task also ends quietly if the token is cancelled some other way first.
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            signal = shutdown_signal() => {
                info!(?signal, "Shutdown signal received");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_watcher_exits_when_token_cancelled_elsewhere() {
        let token = CancellationToken::new();
        let watcher = cancel_on_signal(token.clone());

        token.cancel();

        tokio::time::timeout(Duration::from_secs(2), watcher)
            .await
            .expect("signal watcher did not exit")
            .unwrap();
    }
}
