//! Group posting rules.

use uuid::Uuid;

use crate::domain::entities::Group;

/// Why a user may not post into a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PostDenied {
    #[error("Not a member of this group")]
    NotMember,

    #[error("Only admins can post in channels")]
    ChannelAdminOnly,
}

/// Domain service deciding who may post into a group or channel.
pub struct PostingPolicy;

impl PostingPolicy {
    /// Membership is checked before the channel rule, so a non-member gets
    /// `NotMember` even when the group is a channel.
    pub fn check(group: &Group, user_id: Uuid) -> Result<(), PostDenied> {
        if !group.is_member(user_id) {
            return Err(PostDenied::NotMember);
        }

        if group.is_channel() && !group.is_admin(user_id) {
            return Err(PostDenied::ChannelAdminOnly);
        }

        Ok(())
    }
}
