//! Plain data carried between the RPC surface, the publisher, and the consumer.

pub mod health;
pub mod order;
pub mod record;

pub use health::*;
pub use order::*;
pub use record::*;
