//! Message DTOs
//!
//! The canonical JSON shapes of users, groups and messages sent to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Group, GroupKind, Message, MessageType, User};

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub avatar: Option<String>,
    pub is_superuser: bool,
    pub is_staff: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            is_verified: user.is_verified,
            avatar: user.avatar.clone(),
            is_superuser: user.is_superuser,
            is_staff: user.is_staff,
        }
    }
}

/// Public view of a group or channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub avatar: Option<String>,
    pub admin: UserView,
    pub members: Vec<UserView>,
    pub is_public: bool,
    pub group_type: GroupKind,
}

impl From<&Group> for GroupView {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            name: group.name.clone(),
            description: group.description.clone(),
            avatar: group.avatar.clone(),
            admin: UserView::from(&group.admin),
            members: group.members.iter().map(UserView::from).collect(),
            is_public: group.is_public,
            group_type: group.kind,
        }
    }
}

/// Canonical representation of a stored message, as pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub sender: UserView,
    pub receiver: Option<UserView>,
    pub group: Option<GroupView>,
    pub content: String,
    pub message_type: MessageType,
    pub file: Option<String>,
    pub read_by: Vec<UserView>,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            sender: UserView::from(&message.sender),
            receiver: message.recipient.receiver().map(UserView::from),
            group: message.recipient.group().map(GroupView::from),
            content: message.content.clone(),
            message_type: message.message_type,
            file: message.file.clone(),
            read_by: message.read_by.iter().map(UserView::from).collect(),
            created_at: message.created_at,
        }
    }
}
