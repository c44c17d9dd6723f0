//! Topic bus for inter-agent communication.
//!
//! Topics are opaque strings (a role name, or `"<role>_result"`). Every
//! publish fans out to all handlers registered for the topic concurrently
//! and resolves once all of them finish, then the envelope is readable from
//! the append-only delivery log.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{CrewError, Result};

/// Immutable record of one published message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub topic: String,
    pub content: Value,
    pub sender: Option<String>,
    /// Position in the delivery log; monotonically increasing per bus.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
}

/// Handler for envelopes delivered on a subscribed topic.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn on_message(&self, envelope: &Envelope) -> Result<()>;
}

#[derive(Default)]
pub struct MessageBus {
    subscribers: Mutex<HashMap<String, Vec<Arc<dyn Subscriber>>>>,
    log: Mutex<Vec<Envelope>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a topic. Registration is not deduplicated:
    /// subscribing the same handler twice means two deliveries per publish.
    pub fn subscribe(&self, topic: impl Into<String>, subscriber: Arc<dyn Subscriber>) {
        let topic = topic.into();
        debug!(topic = %topic, "Subscriber registered");
        self.subscribers
            .lock()
            .entry(topic)
            .or_default()
            .push(subscriber);
    }

    /// Remove the first registration of `subscriber` on `topic`.
    /// Returns false when no matching registration exists.
    pub fn unsubscribe(&self, topic: &str, subscriber: &Arc<dyn Subscriber>) -> bool {
        let mut subscribers = self.subscribers.lock();
        let Some(entries) = subscribers.get_mut(topic) else {
            return false;
        };
        let Some(pos) = entries.iter().position(|s| Arc::ptr_eq(s, subscriber)) else {
            return false;
        };
        entries.remove(pos);
        if entries.is_empty() {
            subscribers.remove(topic);
        }
        true
    }

    /// Publish `content` on `topic` and wait for every handler registered at
    /// call time to finish. Handlers run concurrently and are never
    /// cancelled; if any fail, the first error is returned after all have
    /// completed. Handlers added mid-publish are not invoked for this
    /// envelope.
    pub async fn publish(
        &self,
        topic: impl Into<String>,
        content: Value,
        sender: Option<&str>,
    ) -> Result<Envelope> {
        let topic = topic.into();
        let envelope = {
            let mut log = self.log.lock();
            let envelope = Envelope {
                id: Uuid::new_v4().to_string(),
                topic: topic.clone(),
                content,
                sender: sender.map(str::to_string),
                seq: log.len() as u64,
                timestamp: Utc::now(),
            };
            log.push(envelope.clone());
            envelope
        };

        let handlers: Vec<Arc<dyn Subscriber>> = self
            .subscribers
            .lock()
            .get(&topic)
            .cloned()
            .unwrap_or_default();

        debug!(topic = %topic, handlers = handlers.len(), seq = envelope.seq, "Publishing");

        let outcomes = join_all(
            handlers
                .iter()
                .map(|handler| handler.on_message(&envelope)),
        )
        .await;

        let mut first_error = None;
        for outcome in outcomes {
            if let Err(e) = outcome {
                warn!(topic = %topic, error = %e, "Handler failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(CrewError::bus(topic, e.to_string())),
            None => Ok(envelope),
        }
    }

    /// Logged envelopes in publish order, optionally filtered to one topic.
    pub fn history(&self, topic: Option<&str>) -> Vec<Envelope> {
        let log = self.log.lock();
        match topic {
            Some(topic) => log.iter().filter(|e| e.topic == topic).cloned().collect(),
            None => log.clone(),
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .lock()
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    struct CountingSubscriber {
        calls: AtomicUsize,
        delay_ms: u64,
    }

    impl CountingSubscriber {
        fn new(delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay_ms,
            })
        }
    }

    #[async_trait]
    impl Subscriber for CountingSubscriber {
        async fn on_message(&self, _envelope: &Envelope) -> Result<()> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSubscriber;

    #[async_trait]
    impl Subscriber for FailingSubscriber {
        async fn on_message(&self, _envelope: &Envelope) -> Result<()> {
            Err(CrewError::Backend("handler exploded".into()))
        }
    }

    #[tokio::test]
    async fn publish_invokes_every_handler_once() {
        let bus = MessageBus::new();
        let fast = CountingSubscriber::new(0);
        let slow = CountingSubscriber::new(20);
        bus.subscribe("reports", fast.clone());
        bus.subscribe("reports", slow.clone());

        bus.publish("reports", json!({"n": 1}), Some("tester"))
            .await
            .unwrap();

        // publish returns only after the slow handler has completed
        assert_eq!(fast.calls.load(Ordering::SeqCst), 1);
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_registration_delivers_twice() {
        let bus = MessageBus::new();
        let handler = CountingSubscriber::new(0);
        bus.subscribe("t", handler.clone());
        bus.subscribe("t", handler.clone());

        bus.publish("t", json!(null), None).await.unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn handler_failure_surfaces_after_all_ran() {
        let bus = MessageBus::new();
        let ok = CountingSubscriber::new(10);
        bus.subscribe("t", Arc::new(FailingSubscriber));
        bus.subscribe("t", ok.clone());

        let result = bus.publish("t", json!({}), None).await;
        assert!(matches!(result, Err(CrewError::Bus { .. })));
        // the healthy handler still ran to completion
        assert_eq!(ok.calls.load(Ordering::SeqCst), 1);
        // the envelope was logged before delivery
        assert_eq!(bus.history(Some("t")).len(), 1);
    }

    #[tokio::test]
    async fn history_preserves_publish_order_and_payloads() {
        let bus = MessageBus::new();
        bus.publish("a", json!({"i": 0}), Some("x")).await.unwrap();
        bus.publish("b", json!({"i": 1}), None).await.unwrap();
        bus.publish("a", json!({"i": 2}), Some("y")).await.unwrap();

        let all = bus.history(None);
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].seq < w[1].seq));

        let only_a = bus.history(Some("a"));
        assert_eq!(only_a.len(), 2);
        assert_eq!(only_a[0].content, json!({"i": 0}));
        assert_eq!(only_a[0].sender.as_deref(), Some("x"));
        assert_eq!(only_a[1].content, json!({"i": 2}));
    }

    #[tokio::test]
    async fn unsubscribe_removes_one_registration() {
        let bus = MessageBus::new();
        let handler = CountingSubscriber::new(0);
        let as_subscriber: Arc<dyn Subscriber> = handler.clone();
        bus.subscribe("t", handler.clone());
        bus.subscribe("t", handler.clone());

        assert!(bus.unsubscribe("t", &as_subscriber));
        assert_eq!(bus.subscriber_count("t"), 1);

        bus.publish("t", json!({}), None).await.unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        assert!(bus.unsubscribe("t", &as_subscriber));
        assert!(!bus.unsubscribe("t", &as_subscriber));
    }

    #[tokio::test]
    async fn publish_without_subscribers_still_logs() {
        let bus = MessageBus::new();
        let envelope = bus.publish("quiet", json!("hello"), None).await.unwrap();
        assert_eq!(envelope.seq, 0);
        assert_eq!(bus.history(None).len(), 1);
    }
}
