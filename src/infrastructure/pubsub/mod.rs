//! Pub/Sub Module
//!
//! Redis connections and the cross-node fabric relay.
//!
//! # Example
//!
//! ```rust,ignore
//! use honey_realtime::infrastructure::pubsub::{create_redis_client, start_relay};
//!
//! let conn = create_redis_client(&settings.redis).await?;
//! let publisher = start_relay(redis::Client::open(settings.redis.url.as_str())?, channel, node_id, inbox);
//! ```

mod relay;

pub use relay::{accept_frame, start_relay, RelayError, RelayFrame, RelayInbox, RelayPublisher};

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
///
/// Used for health checks; the relay opens its own connections.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}
