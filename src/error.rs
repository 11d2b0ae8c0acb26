//! # Errors
//!
//! The error taxonomy shared by the publishing and consuming halves of the system.
//! Errors visible to RPC callers ([`BridgeError`](crate::bridge::BridgeError)) and to
//! the client ([`ClientError`](crate::client::ClientError)) live next to the code that
//! produces them.

use thiserror::Error;

/// Errors raised by a broker backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker could not be reached, or the requested topic/partition does not exist.
    #[error("cannot connect to broker: {0}")]
    Connect(String),

    /// A write was rejected or timed out.
    #[error("send failed: {reason}")]
    Send { reason: String, retryable: bool },

    /// The broker reported a delivery error on an active subscription.
    #[error("delivery error: {0}")]
    Consume(String),
}

impl BrokerError {
    pub fn send(reason: impl Into<String>, retryable: bool) -> Self {
        BrokerError::Send {
            reason: reason.into(),
            retryable,
        }
    }

    /// Whether repeating the same send may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BrokerError::Send { retryable: true, .. })
    }
}

/// A record could not be durably written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("topic name must not be empty")]
    EmptyTopic,

    #[error("failed to open producer session: {0}")]
    Connect(#[source] BrokerError),

    #[error("broker rejected the record after {attempts} attempt(s): {source}")]
    Rejected { attempts: u32, source: BrokerError },

    #[error("gave up after {attempts} attempt(s): {source}")]
    Exhausted { attempts: u32, source: BrokerError },
}

impl PublishError {
    /// Number of send attempts made before failing (0 when no send was tried).
    pub fn attempts(&self) -> u32 {
        match self {
            PublishError::EmptyTopic | PublishError::Connect(_) => 0,
            PublishError::Rejected { attempts, .. } | PublishError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Failure exits of the consumer loop. The signal-driven exit is not an error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsumerError {
    /// The subscription could not be established.
    #[error("failed to subscribe: {0}")]
    Connect(#[source] BrokerError),

    #[error("stopping after {consecutive} consecutive delivery errors, last: {last}")]
    TooManyErrors { consecutive: u32, last: BrokerError },

    #[error("broker closed the subscription")]
    SubscriptionClosed,

    #[error("consumer task ended without reporting")]
    Aborted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_retryable_sends_are_retryable() {
        assert!(BrokerError::send("timeout", true).is_retryable());
        assert!(!BrokerError::send("record too large", false).is_retryable());
        assert!(!BrokerError::Connect("refused".into()).is_retryable());
        assert!(!BrokerError::Consume("offset out of range".into()).is_retryable());
    }

    #[test]
    fn test_publish_error_reports_attempts() {
        let err = PublishError::Exhausted {
            attempts: 5,
            source: BrokerError::send("timeout", true),
        };
        assert_eq!(err.attempts(), 5);
        assert_eq!(err.to_string(), "gave up after 5 attempt(s): send failed: timeout");
        assert_eq!(PublishError::EmptyTopic.attempts(), 0);
    }
}
