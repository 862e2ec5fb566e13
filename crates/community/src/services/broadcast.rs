//! Broadcast router: per-channel fan-out of committed events.

use cohort_protocol::ChannelEvent;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

/// Holds one broadcast sender per channel, created on first use.
///
/// Delivery is at-most-once: a receiver that falls more than `capacity`
/// events behind observes `RecvError::Lagged` and the skipped events are
/// gone. Clients heal such gaps from history.
pub struct BroadcastRouter {
    capacity: usize,
    channels: RwLock<HashMap<String, broadcast::Sender<ChannelEvent>>>,
}

impl BroadcastRouter {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the broadcaster for a specific channel
    async fn sender(&self, channel_key: &str) -> broadcast::Sender<ChannelEvent> {
        if let Some(sender) = self.channels.read().await.get(channel_key) {
            return sender.clone();
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(channel_key.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Start receiving every event published to the channel from now on
    pub async fn subscribe(&self, channel_key: &str) -> broadcast::Receiver<ChannelEvent> {
        self.sender(channel_key).await.subscribe()
    }

    /// Publish to every current subscriber. Returns how many received it.
    ///
    /// Callers publish while holding whatever lock ordered the underlying
    /// state change, so subscribers see events in commit order.
    pub async fn publish(&self, event: ChannelEvent) -> usize {
        let channel_key = event.channel_key().to_string();
        let sender = self.sender(&channel_key).await;
        // Err only means nobody is listening right now
        let delivered = sender.send(event).unwrap_or(0);
        trace!(channel_key = %channel_key, delivered, "published channel event");
        delivered
    }

    pub async fn subscriber_count(&self, channel_key: &str) -> usize {
        self.channels
            .read()
            .await
            .get(channel_key)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    fn stopped(channel_key: &str, participant_id: i64) -> ChannelEvent {
        ChannelEvent::TypingStopped { channel_key: channel_key.into(), participant_id }
    }

    #[tokio::test]
    async fn test_events_stay_in_their_channel() {
        let router = BroadcastRouter::new(16);
        let mut one = router.subscribe("cohort-1").await;
        let mut two = router.subscribe("cohort-2").await;

        assert_eq!(router.publish(stopped("cohort-1", 5)).await, 1);
        assert_eq!(one.recv().await.unwrap(), stopped("cohort-1", 5));
        assert!(matches!(two.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let router = BroadcastRouter::new(16);
        assert_eq!(router.publish(stopped("cohort-1", 5)).await, 0);
        assert_eq!(router.subscriber_count("cohort-1").await, 0);
    }

    #[tokio::test]
    async fn test_slow_receiver_lags() {
        let router = BroadcastRouter::new(2);
        let mut slow = router.subscribe("cohort-1").await;

        for participant_id in 0..5 {
            router.publish(stopped("cohort-1", participant_id)).await;
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(slow.recv().await.unwrap(), stopped("cohort-1", 3));
    }
}
