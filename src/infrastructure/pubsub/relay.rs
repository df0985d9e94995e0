//! Cross-node fabric relay over Redis pub/sub.
//!
//! Every node publishes the events it fans out locally to one shared Redis
//! channel, tagged with its node id. Every node also listens on that channel
//! and hands frames from other nodes to its local subscribers.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::infrastructure::metrics;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Frames waiting for the publisher task. Beyond this, new frames are dropped.
const RELAY_QUEUE_CAPACITY: usize = 1024;

/// Relay errors
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Invalid relay frame: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("Relay subscription stream ended")]
    StreamEnded,
}

/// One relayed event as it travels through Redis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayFrame {
    /// Node that published the event
    pub origin: Uuid,
    pub topic: String,
    /// Encoded outbound envelope
    pub payload: String,
}

/// Receiver side of the relay: local delivery of frames from other nodes.
pub trait RelayInbox: Send + Sync + 'static {
    fn deliver(&self, topic: &str, payload: &str);
}

/// Handle used by the fabric to push events to other nodes.
///
/// Publishing never waits on Redis. A full queue drops the frame.
#[derive(Debug, Clone)]
pub struct RelayPublisher {
    node_id: Uuid,
    tx: mpsc::Sender<RelayFrame>,
}

impl RelayPublisher {
    pub fn publish(&self, topic: &str, payload: String) {
        let frame = RelayFrame {
            origin: self.node_id,
            topic: topic.to_string(),
            payload,
        };
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                metrics::record_relay_frames("dropped", 1);
                tracing::debug!(topic = %topic, "Relay queue full, frame dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(topic = %topic, "Relay stopped, frame dropped");
            }
        }
    }
}

/// Start the relay for this node and return its publishing handle.
///
/// The background task reconnects with exponential backoff. Frames queued
/// while disconnected are discarded rather than replayed. The task holds the
/// inbox weakly and stops once the inbox is gone or every publisher handle
/// is dropped.
pub fn start_relay(
    client: redis::Client,
    channel: String,
    node_id: Uuid,
    inbox: Arc<dyn RelayInbox>,
) -> RelayPublisher {
    let (tx, mut rx) = mpsc::channel::<RelayFrame>(RELAY_QUEUE_CAPACITY);
    let inbox = Arc::downgrade(&inbox);

    tokio::spawn(async move {
        let mut delay = RECONNECT_DELAY;
        loop {
            if inbox.strong_count() == 0 || rx.is_closed() {
                break;
            }

            let stale = discard_backlog(&mut rx);
            if stale > 0 {
                tracing::debug!(channel = %channel, frames = stale, "Discarded stale relay frames");
            }

            match connect_and_run(&client, &channel, node_id, &inbox, &mut rx).await {
                Ok(()) => break,
                Err(e) => {
                    tracing::warn!(
                        channel = %channel,
                        error = %e,
                        retry_in_secs = delay.as_secs(),
                        "Relay connection lost"
                    );
                }
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(MAX_RECONNECT_DELAY);
        }
        tracing::info!(channel = %channel, "Relay shut down");
    });

    RelayPublisher { node_id, tx }
}

/// Drop everything queued so far. Returns how many frames were dropped.
fn discard_backlog(rx: &mut mpsc::Receiver<RelayFrame>) -> usize {
    let mut discarded = 0;
    while rx.try_recv().is_ok() {
        discarded += 1;
    }
    metrics::record_relay_frames("discarded", discarded);
    discarded
}

/// Runs publisher and listener until either fails. `Ok` means the relay
/// has nothing left to serve.
async fn connect_and_run(
    client: &redis::Client,
    channel: &str,
    node_id: Uuid,
    inbox: &Weak<dyn RelayInbox>,
    rx: &mut mpsc::Receiver<RelayFrame>,
) -> Result<(), RelayError> {
    let mut pub_conn = client.get_multiplexed_async_connection().await?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;

    tracing::info!(channel = %channel, node_id = %node_id, "Relay connected");

    let publish_task = async {
        while let Some(frame) = rx.recv().await {
            let body = serde_json::to_string(&frame)?;
            redis::cmd("PUBLISH")
                .arg(channel)
                .arg(body)
                .query_async::<i64>(&mut pub_conn)
                .await?;
            metrics::record_relay_frames("published", 1);
        }
        Ok::<(), RelayError>(())
    };

    let messages = pubsub.into_on_message();
    tokio::pin!(messages);
    let listen_task = async {
        while let Some(msg) = messages.next().await {
            let Some(inbox) = inbox.upgrade() else {
                return Ok(());
            };
            let raw: String = match msg.get_payload() {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable relay payload");
                    continue;
                }
            };
            if let Err(e) = accept_frame(&raw, node_id, inbox.as_ref()) {
                tracing::warn!(error = %e, "Discarding relay frame");
            }
        }
        Err::<(), RelayError>(RelayError::StreamEnded)
    };

    tokio::select! {
        result = publish_task => result,
        result = listen_task => result,
    }
}

/// Decode a frame and deliver it locally unless this node sent it.
/// Returns whether the frame was delivered.
pub fn accept_frame(raw: &str, node_id: Uuid, inbox: &dyn RelayInbox) -> Result<bool, RelayError> {
    let frame: RelayFrame = serde_json::from_str(raw)?;
    if frame.origin == node_id {
        return Ok(false);
    }
    inbox.deliver(&frame.topic, &frame.payload);
    Ok(true)
}
