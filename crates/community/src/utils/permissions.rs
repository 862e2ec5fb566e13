//! Permission checking utilities.

use cohort_database::ChannelMembership;

use crate::identity::Identity;
use crate::types::{CommunityError, CommunityResult};

/// Permission checking utilities
pub struct PermissionChecker;

impl PermissionChecker {
    /// Moderation and channel setup need the admin capability
    pub fn require_admin(caller: &Identity) -> CommunityResult<()> {
        if !caller.is_admin {
            return Err(CommunityError::forbidden("admin capability required"));
        }
        Ok(())
    }

    /// Reading a channel needs a membership row or the admin capability
    pub fn can_read(caller: &Identity, membership: Option<&ChannelMembership>, key: &str) -> CommunityResult<()> {
        if membership.is_none() && !caller.is_admin {
            return Err(CommunityError::not_member(key));
        }
        Ok(())
    }

    /// Joining the live stream needs a membership row or the admin capability
    pub fn can_join(caller: &Identity, membership: Option<&ChannelMembership>) -> CommunityResult<()> {
        if membership.is_none() && !caller.is_admin {
            return Err(CommunityError::forbidden("not a member of this channel"));
        }
        Ok(())
    }
}
