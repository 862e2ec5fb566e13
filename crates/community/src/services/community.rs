//! The community channel facade consumed by the gateway.
//!
//! Request/response operations take the caller's [`Identity`]; event stream
//! operations additionally take the [`ConnectionId`] of the live connection
//! issuing them.

use cohort_config::CommunityConfig;
use cohort_database::SeedMember;
use cohort_protocol::{
    ChannelEvent, ChannelInfo, CohortChannelStatus, CohortId, Membership, Message, MessagePage, ParticipantId,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::identity::Identity;
use crate::registry::CohortRegistry;
use crate::services::{BroadcastRouter, ChannelStore, ModerationAuthority, PresenceTracker, TypingCoordinator};
use crate::types::{CommunityError, CommunityResult, ConnectionId};
use crate::utils::PermissionChecker;

/// Result of a successful join
#[derive(Debug)]
pub struct JoinedChannel {
    pub channel_key: String,
    pub last_seq: i64,
    pub online: Vec<ParticipantId>,
    /// Every channel event committed after the join, starting with this
    /// connection's own `ParticipantJoined`
    pub events: broadcast::Receiver<ChannelEvent>,
}

pub struct Community {
    store: Arc<ChannelStore>,
    moderation: ModerationAuthority,
    presence: Arc<PresenceTracker>,
    typing: Arc<TypingCoordinator>,
    registry: Arc<dyn CohortRegistry>,
    router: Arc<BroadcastRouter>,
}

impl Community {
    pub fn new(pool: SqlitePool, registry: Arc<dyn CohortRegistry>, config: CommunityConfig) -> Self {
        let router = Arc::new(BroadcastRouter::new(config.broadcast_capacity));
        let presence = Arc::new(PresenceTracker::new(router.clone()));
        let typing = Arc::new(TypingCoordinator::new(router.clone(), config.typing_timeout()));
        let store = Arc::new(ChannelStore::new(pool.clone(), router.clone(), config));
        let moderation =
            ModerationAuthority::new(pool, store.clone(), presence.clone(), typing.clone(), router.clone());

        Self { store, moderation, presence, typing, registry, router }
    }

    pub fn store(&self) -> &ChannelStore {
        &self.store
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn typing_coordinator(&self) -> &TypingCoordinator {
        &self.typing
    }

    pub fn router(&self) -> &BroadcastRouter {
        &self.router
    }

    // ---- request/response operations ----

    pub async fn get_channel_info(&self, caller: &Identity, channel_key: &str) -> CommunityResult<ChannelInfo> {
        let channel = self.store.channel(channel_key).await?;
        let membership = self.store.membership_of(&channel, caller.participant_id).await?;
        PermissionChecker::can_read(caller, membership.as_ref(), channel_key)?;

        let members = self.store.memberships_of(&channel).await?;
        let online = self.presence.online(channel_key).await;

        Ok(ChannelInfo {
            key: channel.key,
            cohort_id: channel.cohort_id,
            last_seq: channel.last_seq,
            created_at: channel.created_at,
            members,
            online,
        })
    }

    pub async fn get_messages(
        &self,
        caller: &Identity,
        channel_key: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> CommunityResult<MessagePage> {
        let channel = self.store.channel(channel_key).await?;
        let membership = self.store.membership_of(&channel, caller.participant_id).await?;
        PermissionChecker::can_read(caller, membership.as_ref(), channel_key)?;

        self.store.read_page(channel_key, limit, offset).await
    }

    /// Admins post only when they hold a membership row like everyone else
    pub async fn send_message(&self, caller: &Identity, channel_key: &str, text: &str) -> CommunityResult<Message> {
        self.store.append(channel_key, caller.participant_id, text).await
    }

    pub async fn mute_member(&self, caller: &Identity, channel_key: &str, target: ParticipantId) -> CommunityResult<Membership> {
        self.moderation.mute(caller, channel_key, target).await
    }

    pub async fn unmute_member(&self, caller: &Identity, channel_key: &str, target: ParticipantId) -> CommunityResult<Membership> {
        self.moderation.unmute(caller, channel_key, target).await
    }

    pub async fn remove_member(&self, caller: &Identity, channel_key: &str, target: ParticipantId) -> CommunityResult<()> {
        self.moderation.remove(caller, channel_key, target).await
    }

    /// Create a cohort's channel, seeded with its enrollments and the creating admin
    pub async fn create_channel(&self, caller: &Identity, cohort_id: CohortId) -> CommunityResult<ChannelInfo> {
        PermissionChecker::require_admin(caller)?;

        if self.registry.cohort(cohort_id).await?.is_none() {
            return Err(CommunityError::CohortNotFound { id: cohort_id });
        }

        let mut members = self.registry.enrollments(cohort_id).await?;
        if !members.iter().any(|member| member.participant_id == caller.participant_id) {
            members.push(SeedMember {
                participant_id: caller.participant_id,
                display_name: caller.display_name.clone(),
            });
        }

        let channel = self.store.create(cohort_id, caller.participant_id, members).await?;
        let members = self.store.memberships_of(&channel).await?;

        Ok(ChannelInfo {
            key: channel.key,
            cohort_id: channel.cohort_id,
            last_seq: channel.last_seq,
            created_at: channel.created_at,
            members,
            online: Vec::new(),
        })
    }

    pub async fn list_cohorts_with_channel_status(&self, caller: &Identity) -> CommunityResult<Vec<CohortChannelStatus>> {
        PermissionChecker::require_admin(caller)?;

        let channels = self.store.list_channels().await?;
        let cohorts = self.registry.list_cohorts().await?;

        Ok(cohorts
            .into_iter()
            .map(|cohort| {
                let channel_key = channels
                    .iter()
                    .find(|channel| channel.cohort_id == cohort.id)
                    .map(|channel| channel.key.clone());
                CohortChannelStatus {
                    cohort_id: cohort.id,
                    name: cohort.name,
                    has_channel: channel_key.is_some(),
                    channel_key,
                }
            })
            .collect())
    }

    // ---- event stream operations ----

    /// Subscribe a connection to a channel and register its presence.
    ///
    /// The receiver is created before the presence entry, so the joining
    /// connection sees its own `ParticipantJoined` and nothing committed
    /// afterwards is missed.
    pub async fn join(&self, caller: &Identity, connection_id: ConnectionId, channel_key: &str) -> CommunityResult<JoinedChannel> {
        let _guard = self.moderation.member_guard(channel_key, caller.participant_id).await;

        let channel = self.store.channel(channel_key).await?;
        let membership = self.store.membership_of(&channel, caller.participant_id).await?;
        PermissionChecker::can_join(caller, membership.as_ref())?;

        let events = self.router.subscribe(channel_key).await;
        let online = self.presence.join(channel_key, connection_id, caller.participant_id).await;

        // re-read so the ack reflects appends that landed while we joined
        let last_seq = self.store.channel(channel_key).await?.last_seq;

        info!(channel_key, %connection_id, participant_id = caller.participant_id, last_seq, "connection joined channel");
        Ok(JoinedChannel { channel_key: channel.key, last_seq, online, events })
    }

    /// Explicit leave. Returns false when the connection was not joined.
    pub async fn leave(&self, connection_id: ConnectionId, channel_key: &str) -> bool {
        self.typing.clear_connection_in(channel_key, connection_id).await;
        let left = self.presence.leave(channel_key, connection_id).await;
        if left {
            info!(channel_key, %connection_id, "connection left channel");
        }
        left
    }

    /// Start or refresh a typing signal; the connection must be joined.
    ///
    /// Holds the member guard so a concurrent removal cannot slip between the
    /// presence check and the new entry.
    pub async fn typing(&self, caller: &Identity, connection_id: ConnectionId, channel_key: &str) -> CommunityResult<()> {
        let _guard = self.moderation.member_guard(channel_key, caller.participant_id).await;
        if !self.presence.is_joined(channel_key, connection_id).await {
            return Err(CommunityError::not_member(channel_key));
        }
        self.typing.signal_typing(channel_key, caller.participant_id, connection_id).await;
        Ok(())
    }

    pub async fn stop_typing(&self, caller: &Identity, connection_id: ConnectionId, channel_key: &str) -> CommunityResult<()> {
        let _guard = self.moderation.member_guard(channel_key, caller.participant_id).await;
        if !self.presence.is_joined(channel_key, connection_id).await {
            return Err(CommunityError::not_member(channel_key));
        }
        self.typing.signal_stop(channel_key, caller.participant_id).await;
        Ok(())
    }

    /// Implicit leave of everything a lost connection held
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        self.typing.clear_connection(connection_id).await;
        let left = self.presence.disconnect(connection_id).await;
        debug!(%connection_id, channels = left.len(), "connection state cleared");
    }
}
