//! WebSocket Connection Handler
//!
//! Upgrade endpoints for direct and group chat. The bearer credential is
//! checked before the upgrade, so a refused client never gets a socket.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::envelope::OutboundEnvelope;
use super::session::{ChatTarget, ConnectionSession};
use crate::application::services::AuthError;
use crate::presentation::http::extractors::BearerCredential;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// How long queued frames may take to flush once the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// `GET /ws/chat/{room_name}/`
pub async fn direct_chat_handler(
    ws: WebSocketUpgrade,
    Path(room_name): Path<String>,
    State(state): State<AppState>,
    bearer: BearerCredential,
) -> Result<Response, AppError> {
    let target = ChatTarget::direct(room_name)
        .ok_or_else(|| AppError::BadRequest("Invalid room name".into()))?;
    upgrade(ws, state, target, bearer).await
}

/// `GET /ws/chat/group/{group_id}/`
pub async fn group_chat_handler(
    ws: WebSocketUpgrade,
    Path(group_id): Path<String>,
    State(state): State<AppState>,
    bearer: BearerCredential,
) -> Result<Response, AppError> {
    let target =
        ChatTarget::group(&group_id).ok_or_else(|| AppError::BadRequest("Invalid group id".into()))?;
    upgrade(ws, state, target, bearer).await
}

async fn upgrade(
    ws: WebSocketUpgrade,
    state: AppState,
    target: ChatTarget,
    bearer: BearerCredential,
) -> Result<Response, AppError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut session = ConnectionSession::new(state.sessions.clone(), target, tx);

    session
        .authenticate(bearer.token())
        .await
        .map_err(refusal)?;

    let ws_settings = &state.settings.websocket;
    Ok(ws
        .max_message_size(ws_settings.max_message_size)
        .max_frame_size(ws_settings.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, session, rx)))
}

/// HTTP response for a refused handshake. Credential and identity problems
/// are the client's; a failing user store is ours.
fn refusal(error: AuthError) -> AppError {
    match error {
        AuthError::Internal(detail) => AppError::Internal(detail),
        other => AppError::Unauthorized(other.to_string()),
    }
}

/// Drive one accepted connection until the client goes away.
async fn handle_socket(
    socket: WebSocket,
    mut session: ConnectionSession,
    mut outbox: mpsc::UnboundedReceiver<Arc<OutboundEnvelope>>,
) {
    if let Err(e) = session.open().await {
        tracing::warn!(connection_id = %session.id(), error = %e, "Failed to open session");
        return;
    }

    // Split socket for concurrent read/write
    let (mut sender, mut receiver) = socket.split();

    // Forward mailbox to the socket
    let mut writer = tokio::spawn(async move {
        while let Some(envelope) = outbox.recv().await {
            if sender
                .send(Message::Text(envelope.encode().into()))
                .await
                .is_err()
            {
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => session.handle_text(text.as_str()).await,
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %session.id(), "Client closed connection");
                break;
            }
            // Pong is handled automatically by axum; binary frames carry nothing for chat
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection_id = %session.id(), error = %e, "WebSocket error");
                break;
            }
        }
    }

    session.close().await;
    drop(session);

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        writer.abort();
    }
}
