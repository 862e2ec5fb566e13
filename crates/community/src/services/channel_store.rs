//! Channel store: the authoritative ordered message log of each channel.

use cohort_config::CommunityConfig;
use cohort_database::{
    Channel, ChannelMembership, ChannelRepository, CreateChannelRequest, MembershipRepository,
    MessageRepository, SeedMember,
};
use cohort_protocol::{channel_key_for_cohort, ChannelEvent, CohortId, Membership, Message, MessagePage, ParticipantId};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::services::BroadcastRouter;
use crate::types::{CommunityError, CommunityResult};
use crate::utils::{KeyedLocks, Validator};

/// Appends are serialized per channel: the writer lock is held from the
/// sequence bump until the `MessageAppended` event is published, so the
/// broadcast order of a channel equals its sequence order.
pub struct ChannelStore {
    channels: ChannelRepository,
    memberships: MembershipRepository,
    messages: MessageRepository,
    writers: KeyedLocks<String>,
    router: Arc<BroadcastRouter>,
    config: CommunityConfig,
}

impl ChannelStore {
    pub fn new(pool: SqlitePool, router: Arc<BroadcastRouter>, config: CommunityConfig) -> Self {
        Self {
            channels: ChannelRepository::new(pool.clone()),
            memberships: MembershipRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
            writers: KeyedLocks::new(),
            router,
            config,
        }
    }

    /// Authorize, number and persist a message, then fan it out.
    ///
    /// Fails with `Validation` before touching storage, with
    /// `ChannelNotFound`/`NotMember`/`Muted` without consuming a sequence
    /// number. The mute check and the insert share one transaction, so a
    /// committed mute is never bypassed.
    pub async fn append(&self, channel_key: &str, sender_id: ParticipantId, text: &str) -> CommunityResult<Message> {
        let body = Validator::message_text(text, self.config.max_message_length)?;

        let _writer = self.writers.lock(channel_key.to_string()).await;
        let message: Message = self
            .messages
            .append(channel_key, sender_id, body)
            .await
            .map_err(|e| CommunityError::from_channel(e, channel_key))?
            .into();

        self.router
            .publish(ChannelEvent::MessageAppended { message: message.clone() })
            .await;

        Ok(message)
    }

    /// One page of history, most recent first
    pub async fn read_page(&self, channel_key: &str, limit: Option<i64>, offset: Option<i64>) -> CommunityResult<MessagePage> {
        let channel = self.channel(channel_key).await?;
        let (limit, offset) =
            Validator::page_bounds(limit, offset, self.config.default_page_size, self.config.max_page_size);

        let messages = self
            .messages
            .page(channel.id, limit, offset)
            .await
            .map_err(|e| CommunityError::from_channel(e, channel_key))?
            .into_iter()
            .map(Message::from)
            .collect();

        Ok(MessagePage { channel_key: channel.key, limit, offset, messages })
    }

    /// Current membership list, including mute state
    pub async fn get_membership(&self, channel_key: &str) -> CommunityResult<Vec<Membership>> {
        let channel = self.channel(channel_key).await?;
        self.memberships_of(&channel).await
    }

    pub(crate) async fn memberships_of(&self, channel: &Channel) -> CommunityResult<Vec<Membership>> {
        Ok(self
            .memberships
            .list_by_channel(channel.id)
            .await
            .map_err(|e| CommunityError::from_channel(e, &channel.key))?
            .into_iter()
            .map(Membership::from)
            .collect())
    }

    pub async fn channel(&self, channel_key: &str) -> CommunityResult<Channel> {
        self.channels
            .get_by_key(channel_key)
            .await
            .map_err(|e| CommunityError::from_channel(e, channel_key))
    }

    pub async fn find_by_cohort(&self, cohort_id: CohortId) -> CommunityResult<Option<Channel>> {
        let key = channel_key_for_cohort(cohort_id);
        self.channels
            .find_by_cohort(cohort_id)
            .await
            .map_err(|e| CommunityError::from_channel(e, &key))
    }

    /// A single participant's membership row, if any
    pub async fn membership_of(&self, channel: &Channel, participant_id: ParticipantId) -> CommunityResult<Option<ChannelMembership>> {
        self.memberships
            .find(channel.id, participant_id)
            .await
            .map_err(|e| CommunityError::from_channel(e, &channel.key))
    }

    /// Create the channel of a cohort with its seed memberships
    pub async fn create(&self, cohort_id: CohortId, created_by: ParticipantId, members: Vec<SeedMember>) -> CommunityResult<Channel> {
        let key = channel_key_for_cohort(cohort_id);
        let request = CreateChannelRequest { key: key.clone(), cohort_id, created_by, members };

        match self.channels.create(&request).await {
            Ok(channel) => {
                info!(channel_key = %channel.key, cohort_id, created_by, "channel created");
                Ok(channel)
            }
            Err(e) => {
                warn!(channel_key = %key, cohort_id, error = %e, "channel creation failed");
                Err(CommunityError::from_channel(e, &key))
            }
        }
    }

    pub async fn list_channels(&self) -> CommunityResult<Vec<Channel>> {
        self.channels
            .list()
            .await
            .map_err(|e| CommunityError::Database { message: e.to_string() })
    }
}
