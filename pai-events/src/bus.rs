//! The `Bus` trait: at-least-once publish/subscribe over named topics.

use async_trait::async_trait;
use pai_core::{BusError, PaiResult};
use serde_json::Value;

/// A live subscription to a topic. Dropping it unsubscribes.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next message published on this topic since the
    /// subscription was created (or since the last `recv`).
    ///
    /// Returns `None` once the topic has been permanently closed
    /// (spec.md §7 "Subscription closed").
    async fn recv(&mut self) -> PaiResult<Option<Value>>;
}

/// The shared message bus (spec.md §2 row B, §6 "Bus topics").
#[async_trait]
pub trait Bus: Send + Sync {
    /// Publish `payload` on `topic`. At-least-once: a message may be
    /// delivered more than once to a given subscriber across reconnects.
    async fn publish(&self, topic: &str, payload: Value) -> PaiResult<()>;

    /// Subscribe to `topic`, receiving every message published from this
    /// point forward.
    async fn subscribe(&self, topic: &str) -> PaiResult<Box<dyn Subscription>>;
}

/// Helper for constructing `PaiError::Bus` variants from implementations.
pub fn no_subscribers(topic: impl Into<String>) -> BusError {
    BusError::NoSubscribers { topic: topic.into() }
}
