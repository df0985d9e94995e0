//! User entity and repository trait.
//!
//! Maps to the `users` table owned by the account service. The realtime
//! layer only reads identity fields and writes the presence columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Represents a user account as seen by the chat layer.
///
/// Maps to the `users` table:
/// - id: UUID PRIMARY KEY
/// - username: VARCHAR(150) NOT NULL UNIQUE
/// - email: VARCHAR(254) NOT NULL
/// - phone: VARCHAR(32) NULL
/// - avatar: TEXT NULL
/// - is_active / is_verified / is_staff / is_superuser: BOOLEAN
/// - online: BOOLEAN NOT NULL DEFAULT FALSE
/// - last_seen: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Primary key
    pub id: Uuid,

    /// Unique login name, shown to peers in typing and call events
    pub username: String,

    /// Email address
    pub email: String,

    /// Phone number
    pub phone: Option<String>,

    /// Avatar file reference
    pub avatar: Option<String>,

    /// Deactivated accounts cannot open chat connections
    pub is_active: bool,

    /// Email/phone verification completed
    pub is_verified: bool,

    /// Staff flag
    pub is_staff: bool,

    /// Superuser flag
    pub is_superuser: bool,

    /// Presence: at least one chat connection believed open
    pub online: bool,

    /// Presence: last connect or disconnect
    pub last_seen: DateTime<Utc>,
}

impl User {
    /// Whether this account may open a chat connection.
    pub fn can_connect(&self) -> bool {
        self.is_active
    }
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            username: String::new(),
            email: String::new(),
            phone: None,
            avatar: None,
            is_active: true,
            is_verified: false,
            is_staff: false,
            is_superuser: false,
            online: false,
            last_seen: Utc::now(),
        }
    }
}

/// Repository trait for the user store.
///
/// Implementations of this trait handle the actual database interactions.
/// The trait is defined in the domain layer to maintain dependency inversion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Write both presence columns in one statement.
    async fn update_presence(
        &self,
        id: Uuid,
        online: bool,
        last_seen: DateTime<Utc>,
    ) -> Result<(), AppError>;
}
