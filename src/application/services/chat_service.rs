//! Chat Service
//!
//! Validates and stores direct and group messages. Publishing is the
//! caller's job and only happens after this returns successfully.

use std::sync::Arc;

use uuid::Uuid;

use crate::application::dto::MessageView;
use crate::domain::{
    GroupRepository, MessageRepository, MessageType, NewMessage, PostDenied, PostingPolicy,
    Recipient, User, UserRepository,
};

use super::auth_service::AuthError;

/// Chat error taxonomy.
///
/// Only `Auth` ends a connection. Every other variant is reported back to
/// the sender as an `error` envelope, except `Transport`: the reply itself
/// could not be queued, so it is only counted.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Invalid JSON")]
    MalformedEnvelope,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Forbidden(#[from] PostDenied),

    #[error("{0}")]
    Persistence(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Peer unreachable: {0}")]
    Transport(String),
}

/// Stores chat messages after checking recipients and posting rules.
pub struct ChatService {
    users: Arc<dyn UserRepository>,
    groups: Arc<dyn GroupRepository>,
    messages: Arc<dyn MessageRepository>,
}

impl ChatService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        groups: Arc<dyn GroupRepository>,
        messages: Arc<dyn MessageRepository>,
    ) -> Self {
        Self {
            users,
            groups,
            messages,
        }
    }

    /// Store a one-to-one message from `sender` to `receiver_id`.
    pub async fn send_direct(
        &self,
        sender: &User,
        receiver_id: &str,
        content: String,
        message_type: Option<&str>,
    ) -> Result<MessageView, ChatError> {
        let message_type = parse_message_type(message_type)?;

        let receiver_id = Uuid::parse_str(receiver_id)
            .map_err(|_| ChatError::NotFound("Receiver not found".into()))?;

        let receiver = self
            .users
            .find_by_id(receiver_id)
            .await
            .map_err(|e| ChatError::Persistence(e.to_string()))?
            .ok_or_else(|| ChatError::NotFound("Receiver not found".into()))?;

        let stored = self
            .messages
            .create(NewMessage {
                sender: sender.clone(),
                recipient: Recipient::Direct(receiver),
                content,
                message_type,
                file: None,
            })
            .await
            .map_err(|e| ChatError::Persistence(e.to_string()))?;

        tracing::debug!(
            message_id = %stored.id,
            sender_id = %sender.id,
            receiver_id = %receiver_id,
            "Direct message stored"
        );

        Ok(MessageView::from(&stored))
    }

    /// Store a message from `sender` into the group `group_id`.
    pub async fn send_group(
        &self,
        sender: &User,
        group_id: Uuid,
        content: String,
        message_type: Option<&str>,
    ) -> Result<MessageView, ChatError> {
        let message_type = parse_message_type(message_type)?;

        let group = self
            .groups
            .find_by_id(group_id)
            .await
            .map_err(|e| ChatError::Persistence(e.to_string()))?
            .ok_or_else(|| ChatError::NotFound("Group not found".into()))?;

        PostingPolicy::check(&group, sender.id)?;

        let stored = self
            .messages
            .create(NewMessage {
                sender: sender.clone(),
                recipient: Recipient::Group(group),
                content,
                message_type,
                file: None,
            })
            .await
            .map_err(|e| ChatError::Persistence(e.to_string()))?;

        tracing::debug!(
            message_id = %stored.id,
            sender_id = %sender.id,
            group_id = %group_id,
            "Group message stored"
        );

        Ok(MessageView::from(&stored))
    }
}

fn parse_message_type(declared: Option<&str>) -> Result<MessageType, ChatError> {
    match declared {
        None => Ok(MessageType::default()),
        Some(value) => MessageType::parse(value)
            .ok_or_else(|| ChatError::Validation(format!("Invalid message_type '{}'", value))),
    }
}
