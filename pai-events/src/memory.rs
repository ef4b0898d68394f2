//! In-process Bus backed by per-topic `tokio::sync::broadcast` channels.
//!
//! Used by `pai-server` when no external message broker is configured, and
//! by tests (spec.md §4.14 "in-memory fakes for Bus/KV/Vector/LLM").

use crate::bus::{Bus, Subscription};
use async_trait::async_trait;
use pai_core::{BusError, PaiError, PaiResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1024;

/// Thread-safe registry of topic -> broadcast sender, created lazily on
/// first publish or subscribe.
pub struct InMemoryBus {
    topics: Mutex<HashMap<String, broadcast::Sender<Value>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<Value> {
        let mut topics = self.topics.lock().expect("bus topic map poisoned");
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bus for InMemoryBus {
    async fn publish(&self, topic: &str, payload: Value) -> PaiResult<()> {
        let sender = self.sender_for(topic);
        // A topic with zero subscribers is not an error: at-least-once
        // delivery only binds existing subscribers, per spec.md §5.
        let _ = sender.send(payload);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> PaiResult<Box<dyn Subscription>> {
        let sender = self.sender_for(topic);
        Ok(Box::new(InMemorySubscription {
            receiver: sender.subscribe(),
            topic: topic.to_string(),
        }))
    }
}

struct InMemorySubscription {
    receiver: broadcast::Receiver<Value>,
    topic: String,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn recv(&mut self) -> PaiResult<Option<Value>> {
        loop {
            match self.receiver.recv().await {
                Ok(value) => return Ok(Some(value)),
                // A lagging subscriber skips the messages it missed rather
                // than treating the gap as a fatal error.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(PaiError::Bus(BusError::SubscriptionClosed {
                        topic: self.topic.clone(),
                    }))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_subscribe_does_not_replay() {
        let bus = InMemoryBus::new();
        bus.publish("agent:infra:tasks", serde_json::json!({"id": 1}))
            .await
            .unwrap();

        let mut sub = bus.subscribe("agent:infra:tasks").await.unwrap();
        bus.publish("agent:infra:tasks", serde_json::json!({"id": 2}))
            .await
            .unwrap();

        let msg = sub.recv().await.unwrap().unwrap();
        assert_eq!(msg["id"], 2);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_the_message() {
        let bus = InMemoryBus::new();
        let mut sub_a = bus.subscribe("agent:responses").await.unwrap();
        let mut sub_b = bus.subscribe("agent:responses").await.unwrap();

        bus.publish("agent:responses", serde_json::json!({"type": "status"}))
            .await
            .unwrap();

        assert_eq!(sub_a.recv().await.unwrap().unwrap()["type"], "status");
        assert_eq!(sub_b.recv().await.unwrap().unwrap()["type"], "status");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_succeeds() {
        let bus = InMemoryBus::new();
        assert!(bus
            .publish("task:abc:progress", serde_json::json!({}))
            .await
            .is_ok());
    }
}
