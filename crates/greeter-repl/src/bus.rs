//! In-process broadcast bus for user events.
//!
//! Models the pub/sub channel between the login authority and greeter
//! replicas: at-most-once per subscriber, no replay, subscriptions are live
//! the moment they are created.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use greeter_types::UserEvent;
use tokio::sync::{broadcast, RwLock};
use tracing::warn;

use crate::{BusError, BusResult};

/// Publisher side of the event channel.
///
/// `publish` takes the already-committed event; implementations must not be
/// consulted before the authoritative mutation commits.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received it. Zero subscribers
    /// is not an error: replicas that are down simply miss the event.
    async fn publish(&self, event: &UserEvent) -> BusResult<usize>;
}

/// Configuration for the broadcast bus.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Per-subscriber buffer capacity before older events are dropped.
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { channel_capacity: 1024 }
    }
}

/// Counters describing bus activity.
#[derive(Debug, Clone, Default)]
pub struct BusStats {
    /// Total events accepted for delivery.
    pub published: u64,
    /// Subscribers observed at the last publish.
    pub subscribers: usize,
    /// Events lost to lagging subscribers, counted when the lag is observed.
    pub dropped: u64,
}

/// Event bus backed by a `tokio::sync::broadcast` channel.
///
/// Payloads travel in the wire format from `greeter_types::UserEvent` so the
/// consumer exercises the same decode path it would against an external
/// message broker.
pub struct BroadcastBus {
    tx: broadcast::Sender<String>,
    stats: Arc<RwLock<BusStats>>,
    dropped: Arc<AtomicU64>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        let (tx, _) = broadcast::channel(config.channel_capacity);
        Self {
            tx,
            stats: Arc::new(RwLock::new(BusStats::default())),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open a live subscription.
    ///
    /// The subscription is active when this returns: anything published
    /// afterwards will be observed. Events published earlier are gone; the
    /// channel keeps no history.
    pub fn subscribe(&self) -> EventStream {
        EventStream { rx: self.tx.subscribe(), dropped: Arc::clone(&self.dropped) }
    }

    /// Current number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish an already-serialized payload.
    ///
    /// The bus carries opaque strings; this is the path an external broker
    /// adapter would use, and what lets tests inject garbage payloads.
    pub async fn publish_raw(&self, payload: String) -> BusResult<usize> {
        let mut stats = self.stats.write().await;
        stats.published += 1;
        let delivered = self.tx.send(payload).unwrap_or(0);
        stats.subscribers = delivered;
        Ok(delivered)
    }

    pub async fn stats(&self) -> BusStats {
        let mut stats = self.stats.read().await.clone();
        stats.dropped = self.dropped.load(Ordering::Relaxed);
        stats
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for BroadcastBus {
    async fn publish(&self, event: &UserEvent) -> BusResult<usize> {
        // send errors only when there are no receivers; that is a quiet bus,
        // not a failure
        self.publish_raw(event.encode()).await
    }
}

/// Consumer side of a subscription.
pub struct EventStream {
    rx: broadcast::Receiver<String>,
    dropped: Arc<AtomicU64>,
}

impl EventStream {
    /// Receive the next raw payload.
    ///
    /// A lagged receiver lost events to the buffer limit; that is the
    /// at-most-once contract in action, so the stream counts the loss, logs,
    /// and keeps going. `None` means the publisher is gone and the stream is
    /// finished.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    self.dropped.fetch_add(missed, Ordering::Relaxed);
                    warn!(missed, "event stream lagged; replica will be stale until reconciled");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive without blocking. `Ok(None)` means no event is waiting.
    pub fn try_recv(&mut self) -> BusResult<Option<String>> {
        loop {
            match self.rx.try_recv() {
                Ok(payload) => return Ok(Some(payload)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    self.dropped.fetch_add(missed, Ordering::Relaxed);
                    warn!(missed, "event stream lagged");
                    continue;
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(BusError::Subscribe("stream closed".to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = BroadcastBus::new();
        let mut stream = bus.subscribe();

        let event = UserEvent::Created { id: 7, name: "alice".to_string() };
        let delivered = bus.publish(&event).await.unwrap();
        assert_eq!(delivered, 1);

        let payload = stream.recv().await.unwrap();
        assert_eq!(UserEvent::decode(&payload).unwrap(), event);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = BroadcastBus::new();
        let event = UserEvent::Deleted { id: 1, name: "bob".to_string() };

        let delivered = bus.publish(&event).await.unwrap();
        assert_eq!(delivered, 0);

        let stats = bus.stats().await;
        assert_eq!(stats.published, 1);
    }

    #[tokio::test]
    async fn test_no_replay_before_subscribe() {
        let bus = BroadcastBus::new();

        bus.publish(&UserEvent::Created { id: 1, name: "early".to_string() })
            .await
            .unwrap();

        let mut stream = bus.subscribe();
        bus.publish(&UserEvent::Created { id: 2, name: "late".to_string() })
            .await
            .unwrap();

        // Only the post-subscribe event arrives
        let payload = stream.recv().await.unwrap();
        let event = UserEvent::decode(&payload).unwrap();
        assert_eq!(event.user_id(), 2);
        assert!(matches!(stream.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_multiple_subscribers_each_receive() {
        let bus = BroadcastBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let event = UserEvent::Created { id: 3, name: "carol".to_string() };
        let delivered = bus.publish(&event).await.unwrap();
        assert_eq!(delivered, 2);

        assert_eq!(UserEvent::decode(&a.recv().await.unwrap()).unwrap(), event);
        assert_eq!(UserEvent::decode(&b.recv().await.unwrap()).unwrap(), event);
    }

    #[tokio::test]
    async fn test_lagged_stream_keeps_going() {
        let bus = BroadcastBus::with_config(BusConfig { channel_capacity: 1 });
        let mut stream = bus.subscribe();

        for id in 0..5 {
            bus.publish(&UserEvent::Created { id, name: format!("u{}", id) })
                .await
                .unwrap();
        }

        // The buffer held one event; the rest were dropped. The stream must
        // still yield what survived rather than dying.
        let payload = stream.recv().await.unwrap();
        let event = UserEvent::decode(&payload).unwrap();
        assert_eq!(event.user_id(), 4);
    }

    #[tokio::test]
    async fn test_dropped_events_are_counted() {
        let bus = BroadcastBus::with_config(BusConfig { channel_capacity: 1 });
        let mut stream = bus.subscribe();

        for id in 0..5 {
            bus.publish(&UserEvent::Created { id, name: format!("u{}", id) })
                .await
                .unwrap();
        }

        // Nothing counted until a receiver actually observes the lag
        assert_eq!(bus.stats().await.dropped, 0);

        stream.recv().await.unwrap();

        let stats = bus.stats().await;
        assert_eq!(stats.published, 5);
        assert_eq!(stats.dropped, 4);
    }
}
