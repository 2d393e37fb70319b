//! In-process pub/sub hub for real-time delivery.
//!
//! Provides topic-keyed broadcast channels. The hub knows nothing about
//! what is being streamed; the event gateway picks the key and payload types.
//!
//! # Usage
//!
//! Producers:
//!   hub.publish(&topic, event).await;
//!
//! Consumers (SSE endpoints, tests):
//!   let rx = hub.subscribe(topic).await;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Topic-keyed broadcast registry.
///
/// Cloneable; clones share the same channels. Publishing to a topic with no
/// subscribers drops the message.
pub struct StreamHub<K, T> {
    channels: Arc<RwLock<HashMap<K, broadcast::Sender<T>>>>,
    capacity: usize,
}

impl<K, T> Clone for StreamHub<K, T> {
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
            capacity: self.capacity,
        }
    }
}

impl<K, T> StreamHub<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    /// Create a hub with default capacity (256 messages per channel).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish to a topic. Returns how many live receivers got it.
    pub async fn publish(&self, topic: &K, value: T) -> usize {
        let channels = self.channels.read().await;
        match channels.get(topic) {
            // Err means no active receivers
            Some(tx) => tx.send(value).unwrap_or(0),
            None => 0,
        }
    }

    /// Subscribe to a topic, creating the channel on first use.
    pub async fn subscribe(&self, topic: K) -> broadcast::Receiver<T> {
        let mut channels = self.channels.write().await;
        channels
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Remove channels nobody listens to any more.
    pub async fn cleanup(&self) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, tx| tx.receiver_count() > 0);
        before - channels.len()
    }

    pub async fn topic_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl<K, T> Default for StreamHub<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let hub: StreamHub<&str, u32> = StreamHub::new();
        let mut rx = hub.subscribe("responder:1").await;

        assert_eq!(hub.publish(&"responder:1", 7).await, 1);
        assert_eq!(rx.recv().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let hub: StreamHub<&str, u32> = StreamHub::new();
        assert_eq!(hub.publish(&"nobody", 1).await, 0);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let hub: StreamHub<&str, u32> = StreamHub::new();
        let mut a = hub.subscribe("a").await;
        let mut b = hub.subscribe("b").await;

        hub.publish(&"a", 1).await;

        assert_eq!(a.recv().await.unwrap(), 1);
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cleanup_removes_dead_channels() {
        let hub: StreamHub<&str, u32> = StreamHub::new();
        let rx = hub.subscribe("ephemeral").await;
        let _keep = hub.subscribe("kept").await;
        assert_eq!(hub.topic_count().await, 2);

        drop(rx);
        assert_eq!(hub.cleanup().await, 1);
        assert_eq!(hub.topic_count().await, 1);
    }
}
