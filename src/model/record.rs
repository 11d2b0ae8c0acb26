//! Records as seen on either side of the broker.

/// A record handed to the broker. Owned by the publisher for one publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl PublishedRecord {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// Where the broker stored an acknowledged record. Logged, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryResult {
    pub partition: i32,
    pub offset: i64,
}

/// A record delivered to a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

impl ConsumedRecord {
    /// Payload rendered for logs; invalid UTF-8 is replaced rather than rejected.
    pub fn payload_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
