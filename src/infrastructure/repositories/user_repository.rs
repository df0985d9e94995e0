//! User Repository Implementation
//!
//! PostgreSQL implementation of the UserRepository trait.
//! Maps between the database schema and domain User entity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{User, UserRepository};
use crate::shared::error::AppError;

/// Column list for `users` aliased as `u`.
pub(crate) const USER_COLUMNS: &str = "u.id, u.username, u.email, u.phone, u.avatar, \
     u.is_active, u.is_verified, u.is_staff, u.is_superuser, u.online, u.last_seen";

/// Database row representation of the users table.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    phone: Option<String>,
    avatar: Option<String>,
    is_active: bool,
    is_verified: bool,
    is_staff: bool,
    is_superuser: bool,
    online: bool,
    last_seen: DateTime<Utc>,
}

impl UserRow {
    /// Convert database row to domain User entity.
    pub(crate) fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            email: self.email,
            phone: self.phone,
            avatar: self.avatar,
            is_active: self.is_active,
            is_verified: self.is_verified,
            is_staff: self.is_staff,
            is_superuser: self.is_superuser,
            online: self.online,
            last_seen: self.last_seen,
        }
    }
}

/// PostgreSQL user repository implementation.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn update_presence(
        &self,
        id: Uuid,
        online: bool,
        last_seen: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET online = $2, last_seen = $3 WHERE id = $1")
            .bind(id)
            .bind(online)
            .bind(last_seen)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }

        Ok(())
    }
}
