//! Presence tracker: who is currently joined to which channel.
//!
//! Presence is keyed by connection, so a participant with two tabs open holds
//! two entries and stays online until the last one goes away. Nothing here
//! is persisted.

use cohort_protocol::{ChannelEvent, ParticipantId};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::services::BroadcastRouter;
use crate::types::ConnectionId;

#[derive(Default)]
struct PresenceState {
    /// channel key -> connection -> participant
    channels: HashMap<String, HashMap<ConnectionId, ParticipantId>>,
    /// connection -> joined channel keys
    connections: HashMap<ConnectionId, HashSet<String>>,
}

impl PresenceState {
    fn online(&self, channel_key: &str) -> BTreeSet<ParticipantId> {
        self.channels
            .get(channel_key)
            .map(|entries| entries.values().copied().collect())
            .unwrap_or_default()
    }

    fn remove_entry(&mut self, channel_key: &str, connection_id: ConnectionId) -> Option<ParticipantId> {
        let entries = self.channels.get_mut(channel_key)?;
        let participant_id = entries.remove(&connection_id)?;
        if entries.is_empty() {
            self.channels.remove(channel_key);
        }

        if let Some(joined) = self.connections.get_mut(&connection_id) {
            joined.remove(channel_key);
            if joined.is_empty() {
                self.connections.remove(&connection_id);
            }
        }
        Some(participant_id)
    }
}

pub struct PresenceTracker {
    router: Arc<BroadcastRouter>,
    state: RwLock<PresenceState>,
}

impl PresenceTracker {
    pub fn new(router: Arc<BroadcastRouter>) -> Self {
        Self { router, state: RwLock::new(PresenceState::default()) }
    }

    /// Register a connection in a channel and return the online participants.
    ///
    /// Joining twice on the same connection is a no-op and broadcasts nothing.
    pub async fn join(&self, channel_key: &str, connection_id: ConnectionId, participant_id: ParticipantId) -> Vec<ParticipantId> {
        let mut state = self.state.write().await;

        let entries = state.channels.entry(channel_key.to_string()).or_default();
        if entries.insert(connection_id, participant_id).is_some() {
            return state.online(channel_key).into_iter().collect();
        }
        state
            .connections
            .entry(connection_id)
            .or_default()
            .insert(channel_key.to_string());

        let online = state.online(channel_key);
        debug!(channel_key, %connection_id, participant_id, online = online.len(), "presence joined");
        self.router
            .publish(ChannelEvent::ParticipantJoined {
                channel_key: channel_key.to_string(),
                participant_id,
                online: online.len(),
            })
            .await;

        online.into_iter().collect()
    }

    /// Drop one connection's entry. Returns false when it was not joined.
    pub async fn leave(&self, channel_key: &str, connection_id: ConnectionId) -> bool {
        let mut state = self.state.write().await;
        let Some(participant_id) = state.remove_entry(channel_key, connection_id) else {
            return false;
        };

        self.announce_left(&state, channel_key, participant_id).await;
        true
    }

    /// Drop every entry a connection holds; returns the channels it left
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Vec<String> {
        let mut state = self.state.write().await;
        let Some(joined) = state.connections.get(&connection_id).cloned() else {
            return Vec::new();
        };

        let mut left = Vec::with_capacity(joined.len());
        for channel_key in joined {
            if let Some(participant_id) = state.remove_entry(&channel_key, connection_id) {
                self.announce_left(&state, &channel_key, participant_id).await;
                left.push(channel_key);
            }
        }
        left
    }

    /// Remove all of a participant's entries in one channel; returns the evicted connections
    pub async fn evict(&self, channel_key: &str, participant_id: ParticipantId) -> Vec<ConnectionId> {
        let mut state = self.state.write().await;
        let connections: Vec<ConnectionId> = state
            .channels
            .get(channel_key)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, owner)| **owner == participant_id)
                    .map(|(connection_id, _)| *connection_id)
                    .collect()
            })
            .unwrap_or_default();

        if connections.is_empty() {
            return connections;
        }

        for connection_id in &connections {
            state.remove_entry(channel_key, *connection_id);
        }
        self.announce_left(&state, channel_key, participant_id).await;
        connections
    }

    /// Distinct online participants, ascending
    pub async fn online(&self, channel_key: &str) -> Vec<ParticipantId> {
        self.state.read().await.online(channel_key).into_iter().collect()
    }

    pub async fn is_joined(&self, channel_key: &str, connection_id: ConnectionId) -> bool {
        self.state
            .read()
            .await
            .channels
            .get(channel_key)
            .is_some_and(|entries| entries.contains_key(&connection_id))
    }

    async fn announce_left(&self, state: &PresenceState, channel_key: &str, participant_id: ParticipantId) {
        let online = state.online(channel_key).len();
        debug!(channel_key, participant_id, online, "presence left");
        self.router
            .publish(ChannelEvent::ParticipantLeft {
                channel_key: channel_key.to_string(),
                participant_id,
                online,
            })
            .await;
    }
}
