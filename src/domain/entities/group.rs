//! Group entity and repository trait.
//!
//! Maps to the `chat_groups` and `chat_group_members` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::User;
use crate::shared::error::AppError;

/// Group kinds matching the `group_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// Every member may post
    #[default]
    Group,
    /// Broadcast channel, only the admin posts
    Channel,
}

impl GroupKind {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "channel" => Self::Channel,
            _ => Self::Group,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Channel => "channel",
        }
    }
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A group or channel with its admin and member list loaded.
///
/// Maps to the `chat_groups` table:
/// - id: UUID PRIMARY KEY
/// - name: VARCHAR(255) NOT NULL UNIQUE
/// - description: TEXT NOT NULL DEFAULT ''
/// - avatar: TEXT NULL
/// - admin_id: UUID NOT NULL REFERENCES users(id)
/// - is_public: BOOLEAN NOT NULL DEFAULT TRUE
/// - group_type: VARCHAR(10) NOT NULL DEFAULT 'group'
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub avatar: Option<String>,
    pub admin: User,
    pub members: Vec<User>,
    pub is_public: bool,
    pub kind: GroupKind,
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Check if a user is the admin of this group.
    pub fn is_admin(&self, user_id: Uuid) -> bool {
        self.admin.id == user_id
    }

    /// Check if a user is listed as a member. The admin counts as a member.
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.is_admin(user_id) || self.members.iter().any(|m| m.id == user_id)
    }

    /// Check if this group is a broadcast channel.
    pub fn is_channel(&self) -> bool {
        self.kind == GroupKind::Channel
    }
}

/// Repository trait for group lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Find a group by ID, with admin and members populated.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>, AppError>;
}
