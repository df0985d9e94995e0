//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::group::Group;
use super::user::User;
use crate::shared::error::AppError;

/// Message content kinds matching the `message_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text
    #[default]
    Text,
    /// Image attachment
    Image,
    /// Generic file attachment
    File,
    /// Voice note
    Voice,
}

impl MessageType {
    /// Parse a client-declared type. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "file" => Some(Self::File),
            "voice" => Some(Self::Voice),
            _ => None,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::Voice => "voice",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a message goes. A message has a receiver or a group, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Recipient {
    /// One-to-one message
    Direct(User),
    /// Group or channel message
    Group(Group),
}

impl Recipient {
    pub fn receiver(&self) -> Option<&User> {
        match self {
            Recipient::Direct(user) => Some(user),
            Recipient::Group(_) => None,
        }
    }

    pub fn group(&self) -> Option<&Group> {
        match self {
            Recipient::Direct(_) => None,
            Recipient::Group(group) => Some(group),
        }
    }
}

/// A message about to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub sender: User,
    pub recipient: Recipient,
    pub content: String,
    pub message_type: MessageType,
    pub file: Option<String>,
}

/// A stored message with its sender, recipient and readers loaded.
///
/// Maps to the `messages` table:
/// - id: UUID PRIMARY KEY
/// - sender_id: UUID NOT NULL REFERENCES users(id)
/// - receiver_id: UUID NULL REFERENCES users(id)
/// - group_id: UUID NULL REFERENCES chat_groups(id)
/// - content: TEXT NOT NULL
/// - message_type: VARCHAR(10) NOT NULL DEFAULT 'text'
/// - file: TEXT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// - CHECK ((receiver_id IS NULL) <> (group_id IS NULL))
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub sender: User,
    pub recipient: Recipient,
    pub content: String,
    pub message_type: MessageType,
    pub file: Option<String>,
    pub read_by: Vec<User>,
    pub created_at: DateTime<Utc>,
}

/// Repository trait for message persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Store a message and return its canonical stored form.
    async fn create(&self, message: NewMessage) -> Result<Message, AppError>;
}
