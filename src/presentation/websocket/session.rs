//! WebSocket Session Management
//!
//! One [`ConnectionSession`] per socket: the handshake gate, inbound
//! envelope dispatch and teardown.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::envelope::{self, CallFrame, InboundEnvelope, MessageFrame, OutboundEnvelope, TypingFrame};
use super::fabric::{ConnectionId, Mailbox, RoutingFabric, Topic};
use crate::application::services::{
    AuthError, ChatError, ChatService, IdentityResolver, PresenceDirectory,
};
use crate::domain::{User, UserRepository};
use crate::infrastructure::metrics;

/// Lifecycle of a chat connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Active,
    Closed,
}

/// Which endpoint the client connected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    /// One-to-one chat, keyed by a room name such as `alice-bob`
    Direct { room: String },
    /// Group or channel chat
    Group { group_id: Uuid },
}

impl ChatTarget {
    /// Build a direct target. Room names are word characters and dashes.
    pub fn direct(room: impl Into<String>) -> Option<Self> {
        let room = room.into();
        let valid = !room.is_empty()
            && room
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
        valid.then_some(ChatTarget::Direct { room })
    }

    /// Build a group target. Any spelling `Uuid` accepts is fine; the
    /// parsed id is what sessions subscribe with.
    pub fn group(group_id: impl AsRef<str>) -> Option<Self> {
        let group_id = Uuid::parse_str(group_id.as_ref().trim()).ok()?;
        Some(ChatTarget::Group { group_id })
    }

    pub fn variant(&self) -> &'static str {
        match self {
            ChatTarget::Direct { .. } => "direct",
            ChatTarget::Group { .. } => "group",
        }
    }
}

/// Shared collaborators handed to every session.
#[derive(Clone)]
pub struct SessionContext {
    pub chat: Arc<ChatService>,
    pub presence: PresenceDirectory,
    pub identity: Arc<dyn IdentityResolver>,
    pub users: Arc<dyn UserRepository>,
    pub fabric: Arc<RoutingFabric>,
}

/// Server side of one chat connection.
pub struct ConnectionSession {
    id: ConnectionId,
    target: ChatTarget,
    ctx: SessionContext,
    mailbox: Mailbox,
    user: Option<User>,
    state: SessionState,
    created_at: DateTime<Utc>,
}

impl ConnectionSession {
    pub fn new(ctx: SessionContext, target: ChatTarget, mailbox: Mailbox) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            ctx,
            mailbox,
            user: None,
            state: SessionState::Unauthenticated,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Resolve the handshake credential to an active user.
    ///
    /// Any failure closes the session for good.
    pub async fn authenticate(&mut self, credential: Option<&str>) -> Result<(), AuthError> {
        if self.state != SessionState::Unauthenticated {
            return Err(AuthError::InvalidToken);
        }

        match self.resolve_user(credential).await {
            Ok(user) => {
                self.user = Some(user);
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Closed;
                tracing::debug!(connection_id = %self.id, error = %e, "Handshake refused");
                Err(e)
            }
        }
    }

    async fn resolve_user(&self, credential: Option<&str>) -> Result<User, AuthError> {
        let token = credential
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        let user_id = self.ctx.identity.resolve(token).await?;

        let user = self
            .ctx
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        if !user.can_connect() {
            return Err(AuthError::Inactive);
        }

        Ok(user)
    }

    /// Join the session's topics and mark the user online.
    pub async fn open(&mut self) -> Result<(), ChatError> {
        if self.state != SessionState::Unauthenticated {
            return Err(ChatError::Auth(AuthError::InvalidToken));
        }
        let Some(user_id) = self.user.as_ref().map(|u| u.id) else {
            return Err(ChatError::Auth(AuthError::MissingCredential));
        };

        let fabric = &self.ctx.fabric;
        match &self.target {
            ChatTarget::Direct { room } => {
                fabric.subscribe(Topic::user(user_id), self.id, self.mailbox.clone());
                fabric.subscribe(Topic::room(room), self.id, self.mailbox.clone());
            }
            ChatTarget::Group { group_id } => {
                fabric.subscribe(Topic::group(*group_id), self.id, self.mailbox.clone());
            }
        }

        self.state = SessionState::Active;
        metrics::session_opened(self.target.variant());

        if let Err(e) = self.ctx.presence.set_online(user_id, true).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to mark user online");
        }

        tracing::info!(
            user_id = %user_id,
            connection_id = %self.id,
            variant = self.target.variant(),
            "Chat session opened"
        );
        Ok(())
    }

    /// Handle one inbound text frame.
    pub async fn handle_text(&mut self, raw: &str) {
        if self.state != SessionState::Active || raw.is_empty() {
            return;
        }

        let envelope = match envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.reject("malformed", e.to_string());
                return;
            }
        };

        let direct = matches!(self.target, ChatTarget::Direct { .. });
        match (direct, envelope) {
            (true, InboundEnvelope::Message(frame)) => self.send_direct(frame).await,
            (false, InboundEnvelope::GroupMessage(frame) | InboundEnvelope::Message(frame)) => {
                self.send_group(frame).await
            }
            (true, InboundEnvelope::Typing(frame)) => self.relay_typing(frame),
            (true, InboundEnvelope::Call(frame)) => self.relay_call(frame),
            (_, other) => {
                tracing::debug!(
                    connection_id = %self.id,
                    tag = other.tag(),
                    "Ignoring envelope"
                );
            }
        }
    }

    async fn send_direct(&self, frame: MessageFrame) {
        let (Some(receiver_id), Some(content)) = (frame.receiver_id, frame.content) else {
            self.reject("validation", "Missing receiver_id or content");
            return;
        };
        let Some(sender) = self.user.as_ref() else {
            return;
        };

        let result = self
            .ctx
            .chat
            .send_direct(sender, &receiver_id, content, frame.message_type.as_deref())
            .await;

        match result {
            Ok(view) => {
                metrics::record_message_stored("direct");
                if let Some(receiver) = &view.receiver {
                    self.ctx.fabric.publish(
                        &Topic::user(receiver.id),
                        OutboundEnvelope::Message {
                            message: view.clone(),
                        },
                    );
                }
                self.reply(OutboundEnvelope::MessageSent { message: view });
            }
            Err(e) => self.reject(error_reason(&e), format!("Failed to send message: {}", e)),
        }
    }

    async fn send_group(&self, frame: MessageFrame) {
        let Some(content) = frame.content else {
            self.reject("validation", "Missing content");
            return;
        };
        let (Some(sender), &ChatTarget::Group { group_id }) = (self.user.as_ref(), &self.target)
        else {
            return;
        };

        let result = self
            .ctx
            .chat
            .send_group(sender, group_id, content, frame.message_type.as_deref())
            .await;

        match result {
            Ok(view) => {
                metrics::record_message_stored("group");
                self.ctx.fabric.publish(
                    &Topic::group(group_id),
                    OutboundEnvelope::GroupMessage { message: view },
                );
            }
            Err(e) => self.reject(error_reason(&e), e.to_string()),
        }
    }

    fn relay_typing(&self, frame: TypingFrame) {
        let (Some(receiver), Some(user)) = (parse_receiver(frame.receiver_id), &self.user) else {
            return;
        };

        self.ctx.fabric.publish(
            &Topic::user(receiver),
            OutboundEnvelope::Typing {
                user_id: user.id,
                username: user.username.clone(),
                is_typing: frame.is_typing,
            },
        );
    }

    fn relay_call(&self, frame: CallFrame) {
        let (Some(receiver), Some(user)) = (parse_receiver(frame.receiver_id), &self.user) else {
            return;
        };

        self.ctx.fabric.publish(
            &Topic::user(receiver),
            OutboundEnvelope::Call {
                call_type: frame.call_type,
                signal_data: frame.signal_data,
                sender_id: user.id,
                sender_username: user.username.clone(),
            },
        );
    }

    /// Queue a frame for this connection. A closed mailbox is a transport
    /// failure: counted, never reported.
    fn reply(&self, envelope: OutboundEnvelope) {
        if self.mailbox.send(Arc::new(envelope)).is_err() {
            let e = ChatError::Transport(format!("connection {} has no writer", self.id));
            metrics::record_envelope_error(error_reason(&e));
            tracing::debug!(connection_id = %self.id, error = %e, "Reply dropped");
        }
    }

    fn reject(&self, reason: &str, message: impl Into<String>) {
        metrics::record_envelope_error(reason);
        self.reply(OutboundEnvelope::error(message));
    }

    /// Leave every topic and mark the user offline. Runs once.
    pub async fn close(&mut self) {
        let Some(user_id) = self.begin_teardown() else {
            return;
        };

        if let Err(e) = self.ctx.presence.set_online(user_id, false).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to mark user offline");
        }
    }

    /// Synchronous half of teardown. Returns the user to mark offline when
    /// this call is the one that closed an active session.
    fn begin_teardown(&mut self) -> Option<Uuid> {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        if previous != SessionState::Active {
            return None;
        }

        self.ctx.fabric.unsubscribe_all(self.id);
        metrics::session_closed(self.target.variant());

        let user_id = self.user.as_ref().map(|u| u.id)?;
        tracing::info!(
            user_id = %user_id,
            connection_id = %self.id,
            "Chat session closed"
        );
        Some(user_id)
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        let Some(user_id) = self.begin_teardown() else {
            return;
        };

        let presence = self.ctx.presence.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = presence.set_online(user_id, false).await {
                        tracing::warn!(user_id = %user_id, error = %e, "Failed to mark user offline");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(user_id = %user_id, "No runtime to mark user offline");
            }
        }
    }
}

fn parse_receiver(receiver_id: Option<String>) -> Option<Uuid> {
    receiver_id.and_then(|id| Uuid::parse_str(&id).ok())
}

fn error_reason(error: &ChatError) -> &'static str {
    match error {
        ChatError::MalformedEnvelope => "malformed",
        ChatError::Validation(_) => "validation",
        ChatError::NotFound(_) => "not_found",
        ChatError::Forbidden(_) => "forbidden",
        ChatError::Persistence(_) => "persistence",
        ChatError::Auth(_) => "auth",
        ChatError::Transport(_) => "transport",
    }
}
