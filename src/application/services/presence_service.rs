//! Presence Directory
//!
//! Online flag and last-seen timestamp per user, stored on the user record.
//! Nothing is cached: every read goes to the user store, so presence is
//! always what the store last accepted.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::UserRepository;
use crate::shared::error::AppError;

/// Reads and writes user presence through the user store.
#[derive(Clone)]
pub struct PresenceDirectory {
    users: Arc<dyn UserRepository>,
}

impl PresenceDirectory {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Set the online flag and stamp last-seen with the current time.
    ///
    /// Always writes, even when the flag already has the requested value.
    pub async fn set_online(&self, user_id: Uuid, online: bool) -> Result<(), AppError> {
        let now = Utc::now();
        self.users.update_presence(user_id, online, now).await?;

        tracing::debug!(user_id = %user_id, online, "Presence updated");
        Ok(())
    }

    /// Whether the store currently marks the user online. Unknown users are offline.
    pub async fn is_online(&self, user_id: Uuid) -> Result<bool, AppError> {
        let user = self.users.find_by_id(user_id).await?;
        Ok(user.map(|u| u.online).unwrap_or(false))
    }
}
