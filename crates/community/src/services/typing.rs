//! Typing coordinator: short-lived "is typing" signals with automatic expiry.

use cohort_protocol::{ChannelEvent, ParticipantId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::services::BroadcastRouter;
use crate::types::ConnectionId;

type TypingKey = (String, ParticipantId);

struct TypingEntry {
    /// Connection whose signal currently keeps the entry alive
    connection_id: ConnectionId,
    generation: u64,
    timer: JoinHandle<()>,
}

/// At most one entry per (channel, participant). Each entry owns one expiry
/// timer; refreshing replaces the timer, and a timer only clears the entry
/// when its generation still matches.
pub struct TypingCoordinator {
    router: Arc<BroadcastRouter>,
    timeout: Duration,
    entries: Arc<Mutex<HashMap<TypingKey, TypingEntry>>>,
    next_generation: AtomicU64,
}

impl TypingCoordinator {
    pub fn new(router: Arc<BroadcastRouter>, timeout: Duration) -> Self {
        Self {
            router,
            timeout,
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Start or refresh a typing signal.
    ///
    /// Only a new entry broadcasts `TypingStarted`; a refresh silently pushes
    /// the expiry out. A refresh from another connection of the same
    /// participant takes ownership of the entry.
    pub async fn signal_typing(&self, channel_key: &str, participant_id: ParticipantId, connection_id: ConnectionId) {
        let key = (channel_key.to_string(), participant_id);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock().await;
        let timer = self.spawn_expiry(key.clone(), generation);

        if let Some(entry) = entries.get_mut(&key) {
            entry.timer.abort();
            entry.timer = timer;
            entry.generation = generation;
            entry.connection_id = connection_id;
            return;
        }

        entries.insert(key, TypingEntry { connection_id, generation, timer });
        debug!(channel_key, participant_id, "typing started");
        self.router
            .publish(ChannelEvent::TypingStarted { channel_key: channel_key.to_string(), participant_id })
            .await;
    }

    /// Clear a typing signal. Returns false when there was none.
    pub async fn signal_stop(&self, channel_key: &str, participant_id: ParticipantId) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.remove(&(channel_key.to_string(), participant_id)) else {
            return false;
        };
        entry.timer.abort();
        self.announce_stopped(channel_key, participant_id).await;
        true
    }

    /// Clear every entry owned by a connection that went away
    pub async fn clear_connection(&self, connection_id: ConnectionId) {
        let mut entries = self.entries.lock().await;
        let owned: Vec<TypingKey> = entries
            .iter()
            .filter(|(_, entry)| entry.connection_id == connection_id)
            .map(|(key, _)| key.clone())
            .collect();

        for key in owned {
            if let Some(entry) = entries.remove(&key) {
                entry.timer.abort();
                self.announce_stopped(&key.0, key.1).await;
            }
        }
    }

    /// Clear one connection's entries in a single channel
    pub async fn clear_connection_in(&self, channel_key: &str, connection_id: ConnectionId) {
        let mut entries = self.entries.lock().await;
        let owned: Vec<TypingKey> = entries
            .iter()
            .filter(|(key, entry)| key.0 == channel_key && entry.connection_id == connection_id)
            .map(|(key, _)| key.clone())
            .collect();

        for key in owned {
            if let Some(entry) = entries.remove(&key) {
                entry.timer.abort();
                self.announce_stopped(&key.0, key.1).await;
            }
        }
    }

    /// Participants currently typing in a channel, ascending
    pub async fn typing(&self, channel_key: &str) -> Vec<ParticipantId> {
        let entries = self.entries.lock().await;
        let mut typing: Vec<ParticipantId> = entries
            .keys()
            .filter(|(key, _)| key == channel_key)
            .map(|(_, participant_id)| *participant_id)
            .collect();
        typing.sort_unstable();
        typing
    }

    fn spawn_expiry(&self, key: TypingKey, generation: u64) -> JoinHandle<()> {
        let entries = self.entries.clone();
        let router = self.router.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let mut entries = entries.lock().await;
            if !entries.get(&key).is_some_and(|entry| entry.generation == generation) {
                return;
            }
            entries.remove(&key);
            let (channel_key, participant_id) = key;
            debug!(channel_key = %channel_key, participant_id, "typing expired");
            router.publish(ChannelEvent::TypingStopped { channel_key, participant_id }).await;
        })
    }

    async fn announce_stopped(&self, channel_key: &str, participant_id: ParticipantId) {
        debug!(channel_key, participant_id, "typing stopped");
        self.router
            .publish(ChannelEvent::TypingStopped { channel_key: channel_key.to_string(), participant_id })
            .await;
    }
}

impl Drop for TypingCoordinator {
    fn drop(&mut self) {
        if let Ok(entries) = self.entries.try_lock() {
            for entry in entries.values() {
                entry.timer.abort();
            }
        }
    }
}
