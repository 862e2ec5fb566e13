//! Moderation authority: mute, unmute and removal of channel members.

use cohort_database::MembershipRepository;
use cohort_protocol::{ChannelEvent, Membership, ParticipantId};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::info;

use crate::identity::Identity;
use crate::services::{BroadcastRouter, ChannelStore, PresenceTracker, TypingCoordinator};
use crate::types::{CommunityError, CommunityResult};
use crate::utils::{KeyedLocks, PermissionChecker};

/// Every state change on one (channel, participant) pair runs under that
/// pair's lock: mutes, removals and joins of the same member are serialized.
pub struct ModerationAuthority {
    store: Arc<ChannelStore>,
    memberships: MembershipRepository,
    presence: Arc<PresenceTracker>,
    typing: Arc<TypingCoordinator>,
    router: Arc<BroadcastRouter>,
    locks: KeyedLocks<(String, ParticipantId)>,
}

impl ModerationAuthority {
    pub fn new(
        pool: SqlitePool,
        store: Arc<ChannelStore>,
        presence: Arc<PresenceTracker>,
        typing: Arc<TypingCoordinator>,
        router: Arc<BroadcastRouter>,
    ) -> Self {
        Self {
            store,
            memberships: MembershipRepository::new(pool),
            presence,
            typing,
            router,
            locks: KeyedLocks::new(),
        }
    }

    /// Exclusive access to one member of one channel
    pub async fn member_guard(&self, channel_key: &str, participant_id: ParticipantId) -> OwnedMutexGuard<()> {
        self.locks.lock((channel_key.to_string(), participant_id)).await
    }

    /// Revoke send permission. Muting a muted member changes nothing and broadcasts nothing.
    pub async fn mute(&self, actor: &Identity, channel_key: &str, target: ParticipantId) -> CommunityResult<Membership> {
        self.set_can_send(actor, channel_key, target, false).await
    }

    /// Restore send permission. Unmuting an unmuted member changes nothing and broadcasts nothing.
    pub async fn unmute(&self, actor: &Identity, channel_key: &str, target: ParticipantId) -> CommunityResult<Membership> {
        self.set_can_send(actor, channel_key, target, true).await
    }

    async fn set_can_send(
        &self,
        actor: &Identity,
        channel_key: &str,
        target: ParticipantId,
        can_send: bool,
    ) -> CommunityResult<Membership> {
        PermissionChecker::require_admin(actor)?;
        let _guard = self.member_guard(channel_key, target).await;
        let channel = self.store.channel(channel_key).await?;

        let update = self
            .memberships
            .set_can_send(channel.id, target, can_send)
            .await
            .map_err(|e| CommunityError::from_channel(e, channel_key))?;
        let membership = Membership::from(update.membership);

        if update.changed {
            info!(
                channel_key,
                target,
                actor = actor.participant_id,
                can_send,
                "member send permission changed"
            );
            self.router
                .publish(ChannelEvent::MemberUpdated {
                    channel_key: channel_key.to_string(),
                    membership: membership.clone(),
                })
                .await;
        }

        Ok(membership)
    }

    /// Hard-delete a membership and tear down the member's live state.
    ///
    /// Broadcasts `ParticipantLeft` (when online), `TypingStopped` (when
    /// typing) and finally `MemberRemoved`.
    pub async fn remove(&self, actor: &Identity, channel_key: &str, target: ParticipantId) -> CommunityResult<()> {
        PermissionChecker::require_admin(actor)?;
        let _guard = self.member_guard(channel_key, target).await;
        let channel = self.store.channel(channel_key).await?;

        self.memberships
            .delete(channel.id, target)
            .await
            .map_err(|e| CommunityError::from_channel(e, channel_key))?;

        let evicted = self.presence.evict(channel_key, target).await;
        self.typing.signal_stop(channel_key, target).await;
        self.router
            .publish(ChannelEvent::MemberRemoved {
                channel_key: channel_key.to_string(),
                participant_id: target,
            })
            .await;

        info!(
            channel_key,
            target,
            actor = actor.participant_id,
            evicted_connections = evicted.len(),
            "member removed"
        );
        Ok(())
    }
}
