//! Chat Envelope Codec
//!
//! One JSON object per text frame, discriminated by its `type` field.
//! Inbound frames are parsed leniently: missing or empty fields are left for
//! the session to judge, unknown tags decode to [`InboundEnvelope::Unknown`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::application::dto::MessageView;
use crate::application::services::ChatError;

/// Payload of a `message` or `group_message` frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageFrame {
    pub receiver_id: Option<String>,
    pub content: Option<String>,
    pub message_type: Option<String>,
}

/// Payload of a `typing` frame. `is_typing` is forwarded as sent and is
/// `false` when absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypingFrame {
    pub receiver_id: Option<String>,
    pub is_typing: Value,
}

/// Payload of a `call` frame. `call_type` and `signal_data` are never
/// inspected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallFrame {
    pub receiver_id: Option<String>,
    pub call_type: Value,
    pub signal_data: Value,
}

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEnvelope {
    Message(MessageFrame),
    GroupMessage(MessageFrame),
    Typing(TypingFrame),
    Call(CallFrame),
    /// Tag not understood by this server, or no tag at all.
    Unknown(Option<String>),
}

impl InboundEnvelope {
    pub fn tag(&self) -> &str {
        match self {
            InboundEnvelope::Message(_) => "message",
            InboundEnvelope::GroupMessage(_) => "group_message",
            InboundEnvelope::Typing(_) => "typing",
            InboundEnvelope::Call(_) => "call",
            InboundEnvelope::Unknown(tag) => tag.as_deref().unwrap_or(""),
        }
    }
}

/// Frames the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEnvelope {
    /// Direct message delivered to its receiver
    Message { message: MessageView },
    /// Acknowledgement of a direct message to its sender
    MessageSent { message: MessageView },
    GroupMessage { message: MessageView },
    Typing {
        user_id: Uuid,
        username: String,
        is_typing: Value,
    },
    Call {
        call_type: Value,
        signal_data: Value,
        sender_id: Uuid,
        sender_username: String,
    },
    Error { message: String },
}

impl OutboundEnvelope {
    pub fn error(message: impl Into<String>) -> Self {
        OutboundEnvelope::Error {
            message: message.into(),
        }
    }

    /// Serialize to the wire text.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize outbound envelope");
            r#"{"type":"error","message":"Internal error"}"#.to_string()
        })
    }
}

/// Parse one inbound text frame.
///
/// Only frames that are not a JSON object fail; everything else decodes.
pub fn decode(raw: &str) -> Result<InboundEnvelope, ChatError> {
    let value: Value = serde_json::from_str(raw).map_err(|_| ChatError::MalformedEnvelope)?;
    let Value::Object(fields) = value else {
        return Err(ChatError::MalformedEnvelope);
    };

    let envelope = match fields.get("type").and_then(Value::as_str) {
        Some("message") => InboundEnvelope::Message(message_frame(&fields)),
        Some("group_message") => InboundEnvelope::GroupMessage(message_frame(&fields)),
        Some("typing") => InboundEnvelope::Typing(TypingFrame {
            receiver_id: id_field(&fields, "receiver_id"),
            is_typing: fields
                .get("is_typing")
                .cloned()
                .unwrap_or(Value::Bool(false)),
        }),
        Some("call") => InboundEnvelope::Call(CallFrame {
            receiver_id: id_field(&fields, "receiver_id"),
            call_type: opaque_field(&fields, "call_type"),
            signal_data: opaque_field(&fields, "signal_data"),
        }),
        other => InboundEnvelope::Unknown(other.map(str::to_owned)),
    };

    Ok(envelope)
}

fn message_frame(fields: &Map<String, Value>) -> MessageFrame {
    MessageFrame {
        receiver_id: id_field(fields, "receiver_id"),
        content: text_field(fields, "content"),
        message_type: fields
            .get("message_type")
            .and_then(Value::as_str)
            .map(str::to_owned),
    }
}

/// Ids arrive as strings or numbers depending on the client.
fn id_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn opaque_field(fields: &Map<String, Value>, key: &str) -> Value {
    fields.get(key).cloned().unwrap_or(Value::Null)
}

fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
